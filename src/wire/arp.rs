//! ARP packets (RFC 826), restricted to the Ethernet/IPv4 flavor.

use std::net::Ipv4Addr;

use super::ethernet::EthernetAddress;
use super::WireError;

/// Opcode: "who has this IP?"
pub const OPCODE_REQUEST: u16 = 1;
/// Opcode: "that IP is at this hardware address."
pub const OPCODE_REPLY: u16 = 2;

const HTYPE_ETHERNET: u16 = 1;
const PTYPE_IPV4: u16 = 0x0800;
const HLEN_ETHERNET: u8 = 6;
const PLEN_IPV4: u8 = 4;

/// An ARP message mapping between IPv4 and Ethernet addresses.
///
/// In a request the target hardware address is ignored (all zeros on the
/// wire); in a reply every field is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpMessage {
    pub opcode: u16,
    pub sender_ethernet_address: EthernetAddress,
    pub sender_ip_address: Ipv4Addr,
    pub target_ethernet_address: EthernetAddress,
    pub target_ip_address: Ipv4Addr,
}

impl ArpMessage {
    pub const LEN: usize = 28;

    pub fn parse(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < Self::LEN {
            return Err(WireError::Truncated {
                need: Self::LEN,
                have: buf.len(),
            });
        }
        let htype = u16::from_be_bytes([buf[0], buf[1]]);
        if htype != HTYPE_ETHERNET {
            return Err(WireError::Unsupported {
                field: "arp hardware type",
                value: u32::from(htype),
            });
        }
        let ptype = u16::from_be_bytes([buf[2], buf[3]]);
        if ptype != PTYPE_IPV4 {
            return Err(WireError::Unsupported {
                field: "arp protocol type",
                value: u32::from(ptype),
            });
        }
        if buf[4] != HLEN_ETHERNET || buf[5] != PLEN_IPV4 {
            return Err(WireError::Unsupported {
                field: "arp address length",
                value: u32::from_be_bytes([0, 0, buf[4], buf[5]]),
            });
        }
        let mut sender_eth = [0u8; 6];
        let mut target_eth = [0u8; 6];
        sender_eth.copy_from_slice(&buf[8..14]);
        target_eth.copy_from_slice(&buf[18..24]);
        Ok(Self {
            opcode: u16::from_be_bytes([buf[6], buf[7]]),
            sender_ethernet_address: EthernetAddress(sender_eth),
            sender_ip_address: Ipv4Addr::new(buf[14], buf[15], buf[16], buf[17]),
            target_ethernet_address: EthernetAddress(target_eth),
            target_ip_address: Ipv4Addr::new(buf[24], buf[25], buf[26], buf[27]),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.extend_from_slice(&HTYPE_ETHERNET.to_be_bytes());
        out.extend_from_slice(&PTYPE_IPV4.to_be_bytes());
        out.push(HLEN_ETHERNET);
        out.push(PLEN_IPV4);
        out.extend_from_slice(&self.opcode.to_be_bytes());
        out.extend_from_slice(&self.sender_ethernet_address.0);
        out.extend_from_slice(&self.sender_ip_address.octets());
        out.extend_from_slice(&self.target_ethernet_address.0);
        out.extend_from_slice(&self.target_ip_address.octets());
        out
    }
}
