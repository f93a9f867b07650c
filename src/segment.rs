//! The two message halves of a TCP segment.
//!
//! Each direction of a connection consumes exactly one half of every
//! segment: the [`SenderMessage`] (sequence number, SYN, payload, FIN) is
//! addressed to the remote receiver, the [`ReceiverMessage`] (ackno,
//! window) to the remote sender.  [`TcpSegment`] bundles both for the
//! wire, plus the connection-wide RST bit.

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::wire::{TcpHeader, WireError};
use crate::wrap32::Wrap32;

/// What a sender says: where these bytes sit in sequence space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderMessage {
    pub seqno: Wrap32,
    pub syn: bool,
    pub payload: Vec<u8>,
    pub fin: bool,
}

impl SenderMessage {
    /// Sequence numbers occupied: payload bytes plus one each for SYN and
    /// FIN.
    pub fn sequence_length(&self) -> u64 {
        u64::from(self.syn) + self.payload.len() as u64 + u64::from(self.fin)
    }
}

/// What a receiver says: the next expected seqno and its free capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverMessage {
    /// Absent until a SYN has been seen.
    pub ackno: Option<Wrap32>,
    pub window_size: u16,
}

/// One segment on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TcpSegment {
    pub sender: SenderMessage,
    pub receiver: ReceiverMessage,
    pub rst: bool,
}

impl TcpSegment {
    /// Serialize as a TCP header plus payload between the given endpoints.
    pub fn encode(&self, src: SocketAddrV4, dst: SocketAddrV4) -> Vec<u8> {
        let header = TcpHeader {
            src_port: src.port(),
            dst_port: dst.port(),
            seqno: self.sender.seqno.raw(),
            ackno: self.receiver.ackno.map_or(0, Wrap32::raw),
            syn: self.sender.syn,
            ack: self.receiver.ackno.is_some(),
            fin: self.sender.fin,
            rst: self.rst,
            window: self.receiver.window_size,
        };
        header.encode(&self.sender.payload, *src.ip(), *dst.ip())
    }

    /// Parse from a TCP payload slice; the address pair is needed for
    /// checksum verification.  Returns the segment with its port pair.
    pub fn parse(
        buf: &[u8],
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
    ) -> Result<(Self, u16, u16), WireError> {
        let (header, payload_offset) = TcpHeader::parse(buf, src_ip, dst_ip)?;
        let segment = Self {
            sender: SenderMessage {
                seqno: Wrap32::new(header.seqno),
                syn: header.syn,
                payload: buf[payload_offset..].to_vec(),
                fin: header.fin,
            },
            receiver: ReceiverMessage {
                ackno: header.ack.then(|| Wrap32::new(header.ackno)),
                window_size: header.window,
            },
            rst: header.rst,
        };
        Ok((segment, header.src_port, header.dst_port))
    }
}
