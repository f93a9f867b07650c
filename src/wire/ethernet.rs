//! Ethernet II framing (destination, source, ethertype, payload).

use std::fmt;

use super::WireError;

/// Ethertype for IPv4 payloads.
pub const ETHERTYPE_IPV4: u16 = 0x0800;
/// Ethertype for ARP payloads.
pub const ETHERTYPE_ARP: u16 = 0x0806;

/// A 48-bit Ethernet (hardware) address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EthernetAddress(pub [u8; 6]);

impl EthernetAddress {
    /// The all-ones broadcast address.
    pub const BROADCAST: Self = Self([0xff; 6]);

    /// A random locally-administered unicast address.
    pub fn random_private() -> Self {
        let mut octets: [u8; 6] = rand::random();
        octets[0] = (octets[0] | 0x02) & !0x01;
        Self(octets)
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for EthernetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

/// The 14-byte Ethernet II header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dst: EthernetAddress,
    pub src: EthernetAddress,
    pub ethertype: u16,
}

impl EthernetHeader {
    pub const LEN: usize = 14;

    pub fn parse(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < Self::LEN {
            return Err(WireError::Truncated {
                need: Self::LEN,
                have: buf.len(),
            });
        }
        let mut dst = [0u8; 6];
        let mut src = [0u8; 6];
        dst.copy_from_slice(&buf[0..6]);
        src.copy_from_slice(&buf[6..12]);
        Ok(Self {
            dst: EthernetAddress(dst),
            src: EthernetAddress(src),
            ethertype: u16::from_be_bytes([buf[12], buf[13]]),
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.dst.0);
        out.extend_from_slice(&self.src.0);
        out.extend_from_slice(&self.ethertype.to_be_bytes());
    }
}

/// A complete frame: header plus opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetFrame {
    pub header: EthernetHeader,
    pub payload: Vec<u8>,
}

impl EthernetFrame {
    pub fn parse(buf: &[u8]) -> Result<Self, WireError> {
        let header = EthernetHeader::parse(buf)?;
        Ok(Self {
            header,
            payload: buf[EthernetHeader::LEN..].to_vec(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(EthernetHeader::LEN + self.payload.len());
        self.header.write(&mut out);
        out.extend_from_slice(&self.payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_roundtrip() {
        let frame = EthernetFrame {
            header: EthernetHeader {
                dst: EthernetAddress([1, 2, 3, 4, 5, 6]),
                src: EthernetAddress([7, 8, 9, 10, 11, 12]),
                ethertype: ETHERTYPE_ARP,
            },
            payload: b"arp goes here".to_vec(),
        };
        let bytes = frame.encode();
        assert_eq!(&bytes[12..14], &[0x08, 0x06]);
        assert_eq!(EthernetFrame::parse(&bytes).unwrap(), frame);
    }

    #[test]
    fn truncated_header_rejected() {
        assert!(matches!(
            EthernetFrame::parse(&[0u8; 13]),
            Err(WireError::Truncated { need: 14, have: 13 })
        ));
    }

    #[test]
    fn broadcast_address() {
        assert!(EthernetAddress([0xff; 6]).is_broadcast());
        assert!(!EthernetAddress([1; 6]).is_broadcast());
        assert_eq!(EthernetAddress::BROADCAST.to_string(), "ff:ff:ff:ff:ff:ff");
    }

    #[test]
    fn random_private_is_unicast_and_local() {
        let addr = EthernetAddress::random_private();
        assert_eq!(addr.0[0] & 0x01, 0, "multicast bit must be clear");
        assert_eq!(addr.0[0] & 0x02, 0x02, "locally-administered bit must be set");
    }
}
