//! One TCP endpoint: sender, receiver, reassembler and the two byte
//! streams, glued together.
//!
//! [`TcpPeer`] owns every component and passes `&mut` borrows down into
//! each call — no component holds a reference to another, so there are no
//! cycles to manage.  Each inbound [`TcpSegment`] is split: its receiver
//! half (ackno, window) feeds our sender, its sender half (seqno,
//! payload, flags) feeds our receiver.  Outbound messages get the current
//! advertisement stapled on just before they leave.

use crate::byte_stream::ByteStream;
use crate::config::TcpConfig;
use crate::reassembler::Reassembler;
use crate::receiver::TcpReceiver;
use crate::segment::TcpSegment;
use crate::sender::TcpSender;

#[derive(Debug)]
pub struct TcpPeer {
    sender: TcpSender,
    receiver: TcpReceiver,
    reassembler: Reassembler,
    outbound: ByteStream,
    inbound: ByteStream,
    /// A segment that occupied sequence space awaits an acknowledgment.
    need_ack: bool,
    /// An RST for our errored streams has already been emitted.
    rst_sent: bool,
    /// Passive endpoints stay silent until the peer's SYN arrives.
    listen: bool,
    /// Whether this endpoint must stay around after both directions
    /// finish, to re-acknowledge a retransmitted FIN.  Cleared when the
    /// peer's stream ends before we have sent our own FIN — then the
    /// peer is the one holding the door.
    linger_after_close: bool,
}

impl TcpPeer {
    /// `active_open` endpoints send the first SYN; passive ones wait for
    /// the peer's.
    pub fn new(config: &TcpConfig, active_open: bool) -> Self {
        Self {
            sender: TcpSender::new(config.initial_rto_ms, config.fixed_isn),
            receiver: TcpReceiver::new(),
            reassembler: Reassembler::new(),
            outbound: ByteStream::new(config.send_capacity),
            inbound: ByteStream::new(config.recv_capacity),
            need_ack: false,
            rst_sent: false,
            listen: !active_open,
            linger_after_close: true,
        }
    }

    // -----------------------------------------------------------------------
    // Application side
    // -----------------------------------------------------------------------

    /// Buffer outbound application bytes.  Returns how many fit.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let accepted = self.outbound.writer().push(data);
        self.fill_window();
        accepted
    }

    /// No more application bytes will follow; a FIN goes out once
    /// everything buffered has been sent.
    pub fn close_outbound(&mut self) {
        self.outbound.writer().close();
        self.fill_window();
    }

    pub fn outbound_capacity(&self) -> usize {
        self.outbound.available_capacity()
    }

    pub fn inbound_buffered(&self) -> usize {
        self.inbound.bytes_buffered()
    }

    /// The peer has closed its direction and every byte was delivered.
    pub fn inbound_finished(&self) -> bool {
        self.inbound.is_finished()
    }

    pub fn has_error(&self) -> bool {
        self.inbound.has_error() || self.outbound.has_error()
    }

    /// Drain up to `max` reassembled bytes for the application.
    pub fn read_inbound(&mut self, max: usize) -> Vec<u8> {
        let mut reader = self.inbound.reader();
        let n = max.min(reader.bytes_buffered());
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            let view = reader.peek();
            let take = view.len().min(n - out.len());
            out.extend_from_slice(&view[..take]);
            reader.pop(take);
        }
        out
    }

    // -----------------------------------------------------------------------
    // Network side
    // -----------------------------------------------------------------------

    /// Process one inbound segment: RST first, then the ack half (so the
    /// window is current), then the data half, then refill the window.
    pub fn receive(&mut self, segment: TcpSegment) {
        if segment.rst {
            log::debug!("connection reset by peer");
            // A reset is never answered with a reset.
            self.rst_sent = true;
            self.inbound.writer().set_error();
            self.outbound.writer().set_error();
            return;
        }

        self.sender.receive(&segment.receiver);
        if segment.sender.sequence_length() > 0 {
            self.need_ack = true;
        }
        let mut writer = self.inbound.writer();
        self.receiver
            .receive(&segment.sender, &mut self.reassembler, &mut writer);

        if self.inbound.is_closed() && !self.sender.fin_sent() {
            self.linger_after_close = false;
        }

        self.fill_window();
    }

    /// The next segment for the wire, if any: the sender's queue first,
    /// then a bare acknowledgment if one is owed.
    pub fn maybe_send(&mut self) -> Option<TcpSegment> {
        let rst = self.has_error();
        let receiver_half = self.receiver.send(&self.inbound);

        if let Some(sender_half) = self.sender.maybe_send() {
            self.need_ack = false;
            return Some(TcpSegment {
                sender: sender_half,
                receiver: receiver_half,
                rst,
            });
        }
        if self.need_ack {
            self.need_ack = false;
            return Some(TcpSegment {
                sender: self.sender.send_empty_message(),
                receiver: receiver_half,
                rst,
            });
        }
        // Errored streams announce themselves to the peer exactly once.
        if rst && !self.rst_sent {
            self.rst_sent = true;
            return Some(TcpSegment {
                sender: self.sender.send_empty_message(),
                receiver: receiver_half,
                rst: true,
            });
        }
        None
    }

    /// Move outbound stream bytes into the sender as the window allows.
    pub fn fill_window(&mut self) {
        if self.listen && !self.receiver.connected() {
            return;
        }
        let mut reader = self.outbound.reader();
        self.sender.push(&mut reader);
    }

    pub fn tick(&mut self, ms: u64) {
        self.sender.tick(ms);
    }

    /// Tear the connection down locally: both streams are flagged as
    /// errored and `active()` turns false.
    pub fn fail(&mut self) {
        self.inbound.writer().set_error();
        self.outbound.writer().set_error();
    }

    pub fn consecutive_retransmissions(&self) -> u32 {
        self.sender.consecutive_retransmissions()
    }

    /// True when this endpoint closed its direction first and must keep
    /// acknowledging FIN retransmissions for a grace period after both
    /// streams finish.
    pub fn linger_after_close(&self) -> bool {
        self.linger_after_close
    }

    /// Still has work to do or data in flight.  False once both
    /// directions have finished cleanly (our FIN acknowledged, the peer's
    /// fully reassembled) or either stream has errored.
    pub fn active(&self) -> bool {
        if self.has_error() {
            return false;
        }
        let send_done = self.sender.fin_acked();
        let recv_done = self.inbound.is_closed();
        !(send_done && recv_done)
    }
}
