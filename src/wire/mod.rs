//! Bit-exact wire codecs for the protocols the stack speaks.
//!
//! Every type here is a plain struct with `parse` / `encode` (or `write`)
//! methods doing big-endian field access by hand.  No I/O happens in this
//! module — it is pure data transformation, and every decoder returns a
//! typed [`WireError`] for malformed input so callers can drop bad frames
//! at debug log level.

pub mod arp;
pub mod checksum;
pub mod ethernet;
pub mod ipv4;
pub mod tcp;

pub use arp::ArpMessage;
pub use ethernet::{EthernetAddress, EthernetFrame, EthernetHeader};
pub use ipv4::{Ipv4Datagram, Ipv4Header};
pub use tcp::TcpHeader;

use thiserror::Error;

/// Errors that can arise when decoding raw bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// Buffer shorter than the fixed part of the header.
    #[error("buffer too short: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
    /// A field carries a value this stack does not handle.
    #[error("unsupported {field} value {value:#x}")]
    Unsupported { field: &'static str, value: u32 },
    /// A length field is inconsistent with the actual buffer.
    #[error("length field inconsistent with buffer")]
    LengthMismatch,
    /// Checksum did not match the recomputed value.
    #[error("checksum mismatch")]
    BadChecksum,
}
