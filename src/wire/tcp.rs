//! TCP headers (RFC 793) with the IPv4 pseudo-header checksum.
//!
//! Options are neither emitted nor interpreted; an incoming data offset
//! beyond 5 words simply skips them.

use std::net::Ipv4Addr;

use super::checksum::Checksum;
use super::ipv4::PROTO_TCP;
use super::WireError;

const FLAG_FIN: u8 = 0x01;
const FLAG_SYN: u8 = 0x02;
const FLAG_RST: u8 = 0x04;
const FLAG_ACK: u8 = 0x10;

/// The fixed fields of a TCP header this stack cares about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub seqno: u32,
    pub ackno: u32,
    pub syn: bool,
    pub ack: bool,
    pub fin: bool,
    pub rst: bool,
    pub window: u16,
}

impl TcpHeader {
    pub const LEN: usize = 20;

    /// Parse the header from a complete TCP segment (header + payload),
    /// verifying the checksum against the given address pair.  Returns the
    /// header and the offset of the payload.
    pub fn parse(buf: &[u8], src_ip: Ipv4Addr, dst_ip: Ipv4Addr) -> Result<(Self, usize), WireError> {
        if buf.len() < Self::LEN {
            return Err(WireError::Truncated {
                need: Self::LEN,
                have: buf.len(),
            });
        }
        let data_offset = usize::from(buf[12] >> 4) * 4;
        if data_offset < Self::LEN || data_offset > buf.len() {
            return Err(WireError::LengthMismatch);
        }
        let mut ck = Checksum::new();
        add_pseudo_header(&mut ck, src_ip, dst_ip, buf.len());
        ck.add(buf);
        if ck.finish() != 0 {
            return Err(WireError::BadChecksum);
        }
        let flags = buf[13];
        Ok((
            Self {
                src_port: u16::from_be_bytes([buf[0], buf[1]]),
                dst_port: u16::from_be_bytes([buf[2], buf[3]]),
                seqno: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
                ackno: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
                syn: flags & FLAG_SYN != 0,
                ack: flags & FLAG_ACK != 0,
                fin: flags & FLAG_FIN != 0,
                rst: flags & FLAG_RST != 0,
                window: u16::from_be_bytes([buf[14], buf[15]]),
            },
            data_offset,
        ))
    }

    /// Serialize the header followed by `payload`, filling in the checksum.
    pub fn encode(&self, payload: &[u8], src_ip: Ipv4Addr, dst_ip: Ipv4Addr) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN + payload.len());
        out.extend_from_slice(&self.src_port.to_be_bytes());
        out.extend_from_slice(&self.dst_port.to_be_bytes());
        out.extend_from_slice(&self.seqno.to_be_bytes());
        out.extend_from_slice(&self.ackno.to_be_bytes());
        out.push(5 << 4); // data offset 5 words, no options
        let mut flags = 0u8;
        if self.fin {
            flags |= FLAG_FIN;
        }
        if self.syn {
            flags |= FLAG_SYN;
        }
        if self.rst {
            flags |= FLAG_RST;
        }
        if self.ack {
            flags |= FLAG_ACK;
        }
        out.push(flags);
        out.extend_from_slice(&self.window.to_be_bytes());
        out.extend_from_slice(&[0, 0]); // checksum placeholder
        out.extend_from_slice(&[0, 0]); // urgent pointer
        out.extend_from_slice(payload);

        let mut ck = Checksum::new();
        add_pseudo_header(&mut ck, src_ip, dst_ip, out.len());
        ck.add(&out);
        let sum = ck.finish();
        out[16..18].copy_from_slice(&sum.to_be_bytes());
        out
    }
}

fn add_pseudo_header(ck: &mut Checksum, src_ip: Ipv4Addr, dst_ip: Ipv4Addr, segment_len: usize) {
    ck.add(&src_ip.octets());
    ck.add(&dst_ip.octets());
    ck.add(&[0, PROTO_TCP]);
    ck.add(&(segment_len as u16).to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);
    const DST: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 2);

    fn sample() -> TcpHeader {
        TcpHeader {
            src_port: 50_000,
            dst_port: 1_200,
            seqno: 0xdead_beef,
            ackno: 0x0102_0304,
            syn: true,
            ack: true,
            fin: false,
            rst: false,
            window: 64_000,
        }
    }

    #[test]
    fn header_roundtrip() {
        let header = sample();
        let bytes = header.encode(b"hello", SRC, DST);
        let (parsed, offset) = TcpHeader::parse(&bytes, SRC, DST).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(&bytes[offset..], b"hello");
    }

    #[test]
    fn checksum_covers_payload() {
        let mut bytes = sample().encode(b"hello", SRC, DST);
        *bytes.last_mut().unwrap() ^= 0x01;
        assert_eq!(TcpHeader::parse(&bytes, SRC, DST), Err(WireError::BadChecksum));
    }

    #[test]
    fn checksum_covers_pseudo_header() {
        let bytes = sample().encode(b"hello", SRC, DST);
        // Same bytes claimed to travel between different hosts must fail.
        assert_eq!(
            TcpHeader::parse(&bytes, SRC, Ipv4Addr::new(192, 168, 1, 3)),
            Err(WireError::BadChecksum)
        );
    }

    #[test]
    fn odd_length_payload() {
        let header = sample();
        let bytes = header.encode(b"odd", SRC, DST);
        let (parsed, offset) = TcpHeader::parse(&bytes, SRC, DST).unwrap();
        assert_eq!(parsed.window, 64_000);
        assert_eq!(&bytes[offset..], b"odd");
    }

    #[test]
    fn bad_data_offset_rejected() {
        let mut bytes = sample().encode(b"", SRC, DST);
        bytes[12] = 4 << 4; // below the legal minimum of 5
        assert_eq!(TcpHeader::parse(&bytes, SRC, DST), Err(WireError::LengthMismatch));
    }
}
