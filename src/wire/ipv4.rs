//! IPv4 headers and datagrams (RFC 791).
//!
//! Fragmented datagrams are rejected on parse; this stack never fragments.

use std::net::Ipv4Addr;

use super::checksum::Checksum;
use super::WireError;

/// IP protocol number for TCP.
pub const PROTO_TCP: u8 = 6;

/// The fixed 20-byte header (no options are ever emitted; incoming options
/// are skipped but contribute to checksum verification).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub tos: u8,
    pub id: u16,
    pub ttl: u8,
    pub proto: u8,
    /// Header checksum as seen on the wire (or last computed).
    pub checksum: u16,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    /// Length of the payload carried behind the header.
    pub payload_len: u16,
}

impl Ipv4Header {
    pub const LEN: usize = 20;
    pub const DEFAULT_TTL: u8 = 64;

    /// Parse a header; returns it together with its on-wire length (which
    /// exceeds [`Self::LEN`] when options are present).
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), WireError> {
        if buf.len() < Self::LEN {
            return Err(WireError::Truncated {
                need: Self::LEN,
                have: buf.len(),
            });
        }
        let version = buf[0] >> 4;
        if version != 4 {
            return Err(WireError::Unsupported {
                field: "ip version",
                value: u32::from(version),
            });
        }
        let header_len = usize::from(buf[0] & 0x0f) * 4;
        if header_len < Self::LEN || header_len > buf.len() {
            return Err(WireError::LengthMismatch);
        }
        let total_len = usize::from(u16::from_be_bytes([buf[2], buf[3]]));
        if total_len < header_len || total_len > buf.len() {
            return Err(WireError::LengthMismatch);
        }
        let flags_frag = u16::from_be_bytes([buf[6], buf[7]]);
        if flags_frag & 0x3fff != 0 {
            // more-fragments set or nonzero offset
            return Err(WireError::Unsupported {
                field: "ip fragment",
                value: u32::from(flags_frag),
            });
        }
        let mut ck = Checksum::new();
        ck.add(&buf[..header_len]);
        if ck.finish() != 0 {
            return Err(WireError::BadChecksum);
        }
        Ok((
            Self {
                tos: buf[1],
                id: u16::from_be_bytes([buf[4], buf[5]]),
                ttl: buf[8],
                proto: buf[9],
                checksum: u16::from_be_bytes([buf[10], buf[11]]),
                src: Ipv4Addr::new(buf[12], buf[13], buf[14], buf[15]),
                dst: Ipv4Addr::new(buf[16], buf[17], buf[18], buf[19]),
                payload_len: (total_len - header_len) as u16,
            },
            header_len,
        ))
    }

    fn serialize(&self) -> [u8; Self::LEN] {
        let total_len = Self::LEN as u16 + self.payload_len;
        let mut out = [0u8; Self::LEN];
        out[0] = 0x45; // version 4, header length 5 words
        out[1] = self.tos;
        out[2..4].copy_from_slice(&total_len.to_be_bytes());
        out[4..6].copy_from_slice(&self.id.to_be_bytes());
        out[6..8].copy_from_slice(&0x4000u16.to_be_bytes()); // don't fragment
        out[8] = self.ttl;
        out[9] = self.proto;
        out[10..12].copy_from_slice(&self.checksum.to_be_bytes());
        out[12..16].copy_from_slice(&self.src.octets());
        out[16..20].copy_from_slice(&self.dst.octets());
        out
    }

    /// Refresh the stored checksum to match the other fields.
    pub fn compute_checksum(&mut self) {
        self.checksum = 0;
        let mut ck = Checksum::new();
        ck.add(&self.serialize());
        self.checksum = ck.finish();
    }

    /// Append the header, with a freshly computed checksum, to `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        let mut header = *self;
        header.compute_checksum();
        out.extend_from_slice(&header.serialize());
    }
}

/// A complete datagram: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Datagram {
    pub header: Ipv4Header,
    pub payload: Vec<u8>,
}

impl Ipv4Datagram {
    /// Build a datagram with the default TTL and a consistent length field.
    pub fn new(src: Ipv4Addr, dst: Ipv4Addr, proto: u8, payload: Vec<u8>) -> Self {
        let mut header = Ipv4Header {
            tos: 0,
            id: 0,
            ttl: Ipv4Header::DEFAULT_TTL,
            proto,
            checksum: 0,
            src,
            dst,
            payload_len: payload.len() as u16,
        };
        header.compute_checksum();
        Self { header, payload }
    }

    pub fn parse(buf: &[u8]) -> Result<Self, WireError> {
        let (header, header_len) = Ipv4Header::parse(buf)?;
        let end = header_len + usize::from(header.payload_len);
        Ok(Self {
            header,
            payload: buf[header_len..end].to_vec(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Ipv4Header::LEN + self.payload.len());
        self.header.write(&mut out);
        out.extend_from_slice(&self.payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Ipv4Datagram {
        Ipv4Datagram::new(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            PROTO_TCP,
            b"payload bytes".to_vec(),
        )
    }

    #[test]
    fn datagram_roundtrip() {
        let dgram = sample();
        let bytes = dgram.encode();
        assert_eq!(bytes.len(), 20 + 13);
        let parsed = Ipv4Datagram::parse(&bytes).unwrap();
        assert_eq!(parsed.payload, dgram.payload);
        assert_eq!(parsed.header.src, dgram.header.src);
        assert_eq!(parsed.header.dst, dgram.header.dst);
        assert_eq!(parsed.header.ttl, Ipv4Header::DEFAULT_TTL);
    }

    #[test]
    fn corrupted_header_fails_checksum() {
        let mut bytes = sample().encode();
        bytes[8] ^= 0xff; // flip the TTL without fixing the checksum
        assert_eq!(Ipv4Datagram::parse(&bytes), Err(WireError::BadChecksum));
    }

    #[test]
    fn recompute_checksum_after_ttl_decrement() {
        let mut dgram = sample();
        dgram.header.ttl -= 1;
        dgram.header.compute_checksum();
        // The encoded form must still verify.
        let parsed = Ipv4Datagram::parse(&dgram.encode()).unwrap();
        assert_eq!(parsed.header.ttl, Ipv4Header::DEFAULT_TTL - 1);
        assert_eq!(parsed.header.checksum, dgram.header.checksum);
    }

    #[test]
    fn fragments_rejected() {
        let mut bytes = sample().encode();
        bytes[6] = 0x20; // more-fragments flag
        // fix the checksum so only the fragment check can fire
        bytes[10] = 0;
        bytes[11] = 0;
        let mut ck = Checksum::new();
        ck.add(&bytes[..20]);
        let sum = ck.finish();
        bytes[10..12].copy_from_slice(&sum.to_be_bytes());
        assert!(matches!(
            Ipv4Datagram::parse(&bytes),
            Err(WireError::Unsupported {
                field: "ip fragment",
                ..
            })
        ));
    }

    #[test]
    fn trailing_padding_is_ignored() {
        let mut bytes = sample().encode();
        bytes.extend_from_slice(&[0, 0, 0, 0]); // link-layer padding
        let parsed = Ipv4Datagram::parse(&bytes).unwrap();
        assert_eq!(parsed.payload, b"payload bytes");
    }

    #[test]
    fn non_v4_rejected() {
        let mut bytes = sample().encode();
        bytes[0] = 0x65;
        assert!(matches!(
            Ipv4Datagram::parse(&bytes),
            Err(WireError::Unsupported {
                field: "ip version",
                ..
            })
        ));
    }
}
