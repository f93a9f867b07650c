//! Longest-prefix-match forwarding between network interfaces.
//!
//! The [`Router`] owns its interfaces.  Each is wrapped in a
//! [`RoutedInterface`] that parks the datagrams surfacing from
//! `recv_frame` until [`Router::route`] sweeps them: TTL is checked and
//! decremented, the header checksum refreshed, the most specific matching
//! route chosen, and the datagram handed to the outgoing interface — to
//! the route's next hop, or straight to its destination when the network
//! is directly attached.

use std::collections::VecDeque;
use std::net::Ipv4Addr;

use crate::interface::NetworkInterface;
use crate::wire::{EthernetFrame, Ipv4Datagram};

/// One forwarding table entry.
#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub prefix: Ipv4Addr,
    pub prefix_len: u8,
    /// `None` means the matched network is directly attached.
    pub next_hop: Option<Ipv4Addr>,
    /// Index of the outgoing interface.
    pub interface: usize,
}

/// A [`NetworkInterface`] plus a queue of datagrams it has received.
#[derive(Debug)]
pub struct RoutedInterface {
    inner: NetworkInterface,
    datagrams_in: VecDeque<Ipv4Datagram>,
}

impl RoutedInterface {
    fn new(inner: NetworkInterface) -> Self {
        Self {
            inner,
            datagrams_in: VecDeque::new(),
        }
    }

    /// Feed a frame from the wire; any datagram it carries is queued for
    /// the next [`Router::route`] pass.
    pub fn recv_frame(&mut self, frame: &EthernetFrame) {
        if let Some(dgram) = self.inner.recv_frame(frame) {
            self.datagrams_in.push_back(dgram);
        }
    }

    pub fn maybe_receive(&mut self) -> Option<Ipv4Datagram> {
        self.datagrams_in.pop_front()
    }

    pub fn maybe_send(&mut self) -> Option<EthernetFrame> {
        self.inner.maybe_send()
    }

    pub fn send_datagram(&mut self, dgram: Ipv4Datagram, next_hop: Ipv4Addr) {
        self.inner.send_datagram(dgram, next_hop);
    }

    pub fn tick(&mut self, ms: u64) {
        self.inner.tick(ms);
    }
}

#[derive(Debug, Default)]
pub struct Router {
    interfaces: Vec<RoutedInterface>,
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of an interface; returns its index for
    /// [`add_route`](Self::add_route).
    pub fn add_interface(&mut self, interface: NetworkInterface) -> usize {
        self.interfaces.push(RoutedInterface::new(interface));
        self.interfaces.len() - 1
    }

    pub fn interface_mut(&mut self, index: usize) -> &mut RoutedInterface {
        &mut self.interfaces[index]
    }

    pub fn add_route(
        &mut self,
        prefix: Ipv4Addr,
        prefix_len: u8,
        next_hop: Option<Ipv4Addr>,
        interface: usize,
    ) {
        debug_assert!(prefix_len <= 32);
        log::debug!(
            "route {prefix}/{prefix_len} => {} via interface {interface}",
            next_hop.map_or_else(|| "(direct)".into(), |hop| hop.to_string())
        );
        self.routes.push(Route {
            prefix,
            prefix_len,
            next_hop,
            interface,
        });
    }

    /// Forward every datagram currently parked on any interface.
    pub fn route(&mut self) {
        let mut arrivals = Vec::new();
        for interface in &mut self.interfaces {
            while let Some(dgram) = interface.maybe_receive() {
                arrivals.push(dgram);
            }
        }

        for mut dgram in arrivals {
            let dst = dgram.header.dst;
            if dgram.header.ttl <= 1 {
                log::debug!("dropping datagram to {dst}: ttl expired");
                continue;
            }
            dgram.header.ttl -= 1;
            dgram.header.compute_checksum();

            let Some(route) = self.best_match(dst) else {
                log::debug!("dropping datagram to {dst}: no route");
                continue;
            };
            let next_hop = route.next_hop.unwrap_or(dst);
            self.interfaces[route.interface].send_datagram(dgram, next_hop);
        }
    }

    /// The matching route with the longest prefix; earlier insertions win
    /// ties.
    fn best_match(&self, dst: Ipv4Addr) -> Option<Route> {
        let mut best: Option<Route> = None;
        for route in &self.routes {
            let mask = prefix_mask(route.prefix_len);
            if u32::from(dst) & mask != u32::from(route.prefix) & mask {
                continue;
            }
            if best.is_none_or(|b| route.prefix_len > b.prefix_len) {
                best = Some(*route);
            }
        }
        best
    }
}

/// The top `len` bits set; `len == 0` matches everything.
fn prefix_mask(len: u8) -> u32 {
    (!0u32).checked_shl(32 - u32::from(len)).unwrap_or(0)
}
