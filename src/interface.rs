//! IP-in-Ethernet adaptation with ARP resolution.
//!
//! A [`NetworkInterface`] sits between a producer of IPv4 datagrams (a
//! TCP endpoint, or a router) and an Ethernet-speaking link.  Outbound
//! datagrams need the next hop's hardware address: known mappings come
//! from the ARP cache, unknown ones trigger a broadcast ARP request while
//! the datagram waits.  Inbound frames are filtered by destination
//! address, ARP payloads feed the cache (and get replies when they ask
//! about us), IPv4 payloads are handed back to the caller.
//!
//! Time is virtual: [`tick`](NetworkInterface::tick) advances a local
//! millisecond clock that expires cache entries after 30 s and lets a new
//! ARP request out at most once per 5 s per address.

use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;

use crate::wire::ethernet::{ETHERTYPE_ARP, ETHERTYPE_IPV4};
use crate::wire::{arp, ArpMessage, EthernetAddress, EthernetFrame, EthernetHeader, Ipv4Datagram};

/// Minimum delay between ARP requests for the same address.
pub const ARP_REQUEST_INTERVAL_MS: u64 = 5_000;
/// Lifetime of a learned IP-to-Ethernet mapping.
pub const ARP_ENTRY_TTL_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    mac: EthernetAddress,
    learned_at: u64,
}

#[derive(Debug)]
pub struct NetworkInterface {
    eth_addr: EthernetAddress,
    ip_addr: Ipv4Addr,
    now_ms: u64,

    /// Learned mappings, each stamped with its learning time.
    cache: HashMap<Ipv4Addr, CacheEntry>,
    /// Addresses with an ARP request in flight, stamped with send time.
    requested: HashMap<Ipv4Addr, u64>,
    /// Frames ready for the wire.
    ready: VecDeque<EthernetFrame>,
    /// One datagram per unresolved next hop; a newer one replaces it.
    pending: HashMap<Ipv4Addr, Ipv4Datagram>,
}

impl NetworkInterface {
    pub fn new(eth_addr: EthernetAddress, ip_addr: Ipv4Addr) -> Self {
        log::debug!("interface up: {eth_addr} / {ip_addr}");
        Self {
            eth_addr,
            ip_addr,
            now_ms: 0,
            cache: HashMap::new(),
            requested: HashMap::new(),
            ready: VecDeque::new(),
            pending: HashMap::new(),
        }
    }

    pub fn eth_address(&self) -> EthernetAddress {
        self.eth_addr
    }

    pub fn ip_address(&self) -> Ipv4Addr {
        self.ip_addr
    }

    /// Queue `dgram` for transmission to `next_hop`.  With a cached
    /// mapping the frame goes straight to the ready queue; otherwise the
    /// datagram waits for ARP resolution.
    pub fn send_datagram(&mut self, dgram: Ipv4Datagram, next_hop: Ipv4Addr) {
        if let Some(entry) = self.cache.get(&next_hop) {
            let frame = self.ipv4_frame(entry.mac, &dgram);
            self.ready.push_back(frame);
            return;
        }
        if !self.requested.contains_key(&next_hop) {
            log::debug!("arp: who has {next_hop}? tell {}", self.ip_addr);
            let request = self.arp_frame(
                arp::OPCODE_REQUEST,
                EthernetAddress::default(),
                next_hop,
                EthernetAddress::BROADCAST,
            );
            self.ready.push_back(request);
            self.requested.insert(next_hop, self.now_ms);
        }
        self.pending.insert(next_hop, dgram);
    }

    /// Process one inbound frame.  Returns the datagram for IPv4 frames
    /// addressed to us; ARP frames are consumed internally.
    pub fn recv_frame(&mut self, frame: &EthernetFrame) -> Option<Ipv4Datagram> {
        if frame.header.dst != self.eth_addr && !frame.header.dst.is_broadcast() {
            return None;
        }
        match frame.header.ethertype {
            ETHERTYPE_ARP => {
                self.handle_arp(&frame.payload);
                None
            }
            ETHERTYPE_IPV4 => match Ipv4Datagram::parse(&frame.payload) {
                Ok(dgram) => Some(dgram),
                Err(e) => {
                    log::debug!("dropping undecodable ipv4 frame: {e}");
                    None
                }
            },
            other => {
                log::debug!("ignoring frame with ethertype {other:#06x}");
                None
            }
        }
    }

    fn handle_arp(&mut self, payload: &[u8]) {
        let message = match ArpMessage::parse(payload) {
            Ok(m) => m,
            Err(e) => {
                log::debug!("dropping undecodable arp frame: {e}");
                return;
            }
        };

        // Both requests and replies carry an authoritative sender mapping.
        self.cache.insert(
            message.sender_ip_address,
            CacheEntry {
                mac: message.sender_ethernet_address,
                learned_at: self.now_ms,
            },
        );
        self.requested.remove(&message.sender_ip_address);

        match message.opcode {
            arp::OPCODE_REPLY => {
                if let Some(dgram) = self.pending.remove(&message.sender_ip_address) {
                    let frame = self.ipv4_frame(message.sender_ethernet_address, &dgram);
                    self.ready.push_back(frame);
                }
            }
            arp::OPCODE_REQUEST if message.target_ip_address == self.ip_addr => {
                let reply = self.arp_frame(
                    arp::OPCODE_REPLY,
                    message.sender_ethernet_address,
                    message.sender_ip_address,
                    message.sender_ethernet_address,
                );
                self.ready.push_back(reply);
            }
            _ => {}
        }
    }

    /// Advance the virtual clock, expiring stale cache entries and
    /// forgetting old request timestamps.
    pub fn tick(&mut self, ms: u64) {
        self.now_ms += ms;
        let now = self.now_ms;
        self.cache.retain(|_, entry| now - entry.learned_at <= ARP_ENTRY_TTL_MS);
        self.requested.retain(|_, sent_at| now - *sent_at < ARP_REQUEST_INTERVAL_MS);
    }

    /// Pop the next frame bound for the wire.
    pub fn maybe_send(&mut self) -> Option<EthernetFrame> {
        self.ready.pop_front()
    }

    fn ipv4_frame(&self, dst: EthernetAddress, dgram: &Ipv4Datagram) -> EthernetFrame {
        EthernetFrame {
            header: EthernetHeader {
                dst,
                src: self.eth_addr,
                ethertype: ETHERTYPE_IPV4,
            },
            payload: dgram.encode(),
        }
    }

    fn arp_frame(
        &self,
        opcode: u16,
        target_eth: EthernetAddress,
        target_ip: Ipv4Addr,
        dst: EthernetAddress,
    ) -> EthernetFrame {
        let message = ArpMessage {
            opcode,
            sender_ethernet_address: self.eth_addr,
            sender_ip_address: self.ip_addr,
            target_ethernet_address: target_eth,
            target_ip_address: target_ip,
        };
        EthernetFrame {
            header: EthernetHeader {
                dst,
                src: self.eth_addr,
                ethertype: ETHERTYPE_ARP,
            },
            payload: message.encode(),
        }
    }
}
