//! The receive half of a TCP endpoint.
//!
//! Translates the peer's [`SenderMessage`]s into reassembler insertions
//! and derives the [`ReceiverMessage`] (ackno + window) to advertise back.
//! Sequence-space bookkeeping: the SYN occupies the sequence number just
//! before the first data byte, and the FIN the one just after the last,
//! so `ackno = isn + 1 + bytes_pushed (+ 1 once the stream has closed)`.

use crate::byte_stream::{ByteStream, Writer};
use crate::reassembler::Reassembler;
use crate::segment::{ReceiverMessage, SenderMessage};
use crate::wrap32::Wrap32;

pub const MAX_WINDOW_SIZE: u64 = u16::MAX as u64;

#[derive(Debug, Default)]
pub struct TcpReceiver {
    /// The peer's initial sequence number, learned from its SYN.
    isn: Option<Wrap32>,
}

impl TcpReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A SYN has been seen; segments are being accepted.
    pub fn connected(&self) -> bool {
        self.isn.is_some()
    }

    /// Feed one inbound message to the reassembler.  Segments that arrive
    /// before the SYN are dropped.
    pub fn receive(
        &mut self,
        message: &SenderMessage,
        reassembler: &mut Reassembler,
        inbound: &mut Writer<'_>,
    ) {
        if message.syn {
            self.isn = Some(message.seqno);
        }
        let Some(isn) = self.isn else {
            log::debug!("dropping segment received before SYN");
            return;
        };

        // The first byte the stream still expects sits one past `bytes
        // pushed` in sequence space (the +1 accounts for the SYN), which
        // makes a fine unwrap checkpoint.
        let checkpoint = inbound.bytes_pushed() + 1;
        let data_seqno = if message.syn {
            message.seqno + 1
        } else {
            message.seqno
        };
        let abs_seqno = data_seqno.unwrap(isn, checkpoint);
        let Some(stream_index) = abs_seqno.checked_sub(1) else {
            // A non-SYN segment claiming the ISN itself carries no data.
            log::debug!("dropping segment at the initial sequence number");
            return;
        };
        reassembler.insert(stream_index, &message.payload, message.fin, inbound);
    }

    /// The advertisement to send back: cumulative ackno (absent before
    /// the SYN) and the free capacity of the inbound stream, clipped to
    /// what a 16-bit window can say.
    pub fn send(&self, inbound: &ByteStream) -> ReceiverMessage {
        ReceiverMessage {
            ackno: self.isn.map(|isn| {
                isn + 1 + inbound.bytes_pushed() + u64::from(inbound.is_closed())
            }),
            window_size: (inbound.available_capacity() as u64).min(MAX_WINDOW_SIZE) as u16,
        }
    }
}
