//! Endpoint and adapter tunables.

use std::net::SocketAddrV4;

use crate::wrap32::Wrap32;

/// Per-endpoint TCP parameters.
#[derive(Debug, Clone, Copy)]
pub struct TcpConfig {
    /// Retransmission timeout before any back-off.  Tests drop this to
    /// 100 ms to keep retransmission scenarios fast.
    pub initial_rto_ms: u64,
    /// Capacity of the inbound byte stream (bounds the receive window).
    pub recv_capacity: usize,
    /// Capacity of the outbound byte stream.
    pub send_capacity: usize,
    /// Give up on the connection after this many consecutive
    /// retransmissions of the same message.
    pub max_retx_attempts: u32,
    /// Pin the initial sequence number instead of picking a random one.
    pub fixed_isn: Option<Wrap32>,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            initial_rto_ms: 1_000,
            recv_capacity: 64_000,
            send_capacity: 64_000,
            max_retx_attempts: 8,
            fixed_isn: None,
        }
    }
}

/// Addressing for a datagram adapter: the endpoints of the connection as
/// seen inside the tunnel, not the transport addresses underneath.
#[derive(Debug, Clone, Copy)]
pub struct AdapterConfig {
    pub source: SocketAddrV4,
    pub destination: SocketAddrV4,
}

impl AdapterConfig {
    /// The same connection seen from the other end.
    pub fn flipped(&self) -> Self {
        Self {
            source: self.destination,
            destination: self.source,
        }
    }
}
