//! Datagram transports the TCP endpoint runs over.
//!
//! A [`DatagramAdapter`] moves whole [`TcpSegment`]s between an endpoint
//! and the outside world; everything below the segment boundary —
//! encapsulation, addressing, ARP — is the adapter's business.  Three
//! flavors are provided:
//!
//! - [`UdpDatagramAdapter`] — TCP-in-IPv4 carried in UDP datagrams, the
//!   simplest way to connect two stacks across real networks.
//! - [`EthernetAdapter`] — the full TCP-in-IPv4-in-Ethernet path through
//!   a [`NetworkInterface`], with the frames themselves tunneled over
//!   UDP.  Exercises ARP resolution end to end.
//! - [`LossyAdapter`] — wraps any adapter and drops segments with a
//!   configured probability, for exercising retransmission.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tokio::net::UdpSocket;

use crate::config::AdapterConfig;
use crate::interface::NetworkInterface;
use crate::segment::TcpSegment;
use crate::wire::ipv4::PROTO_TCP;
use crate::wire::{EthernetAddress, EthernetFrame, Ipv4Datagram};

/// Errors surfaced by adapters.  Malformed or misaddressed traffic is
/// not an error — it is dropped with a debug log — so anything here means
/// the transport itself failed.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("datagram transport failed")]
    Io(#[from] io::Error),
}

/// The capability the session worker needs from its transport.
pub trait DatagramAdapter {
    fn config(&self) -> &AdapterConfig;

    /// Advance adapter-internal time (ARP caches and the like).
    fn tick(&mut self, _ms: u64) {}

    /// The next well-formed segment addressed to this endpoint.
    fn recv_segment(&mut self) -> impl Future<Output = Result<TcpSegment, AdapterError>> + Send;

    /// Hand one segment to the transport.
    fn send_segment(
        &mut self,
        segment: &TcpSegment,
    ) -> impl Future<Output = Result<(), AdapterError>> + Send;
}

/// Filter one decapsulated IPv4 datagram down to its segment.  `None`
/// means the payload was malformed or meant for someone else.
fn decode_segment(dgram: &Ipv4Datagram, cfg: &AdapterConfig) -> Option<TcpSegment> {
    if dgram.header.proto != PROTO_TCP
        || dgram.header.dst != *cfg.source.ip()
        || dgram.header.src != *cfg.destination.ip()
    {
        log::debug!(
            "dropping datagram {} -> {} proto {}",
            dgram.header.src,
            dgram.header.dst,
            dgram.header.proto
        );
        return None;
    }
    let (segment, src_port, dst_port) =
        match TcpSegment::parse(&dgram.payload, dgram.header.src, dgram.header.dst) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::debug!("dropping undecodable segment: {e}");
                return None;
            }
        };
    if src_port != cfg.destination.port() || dst_port != cfg.source.port() {
        log::debug!("dropping segment for port {dst_port}");
        return None;
    }
    Some(segment)
}

// ---------------------------------------------------------------------------
// UdpDatagramAdapter
// ---------------------------------------------------------------------------

/// TCP segments inside IPv4 datagrams inside UDP.
///
/// The transport peer is either given up front ([`connect`]) or learned
/// from the first datagram that arrives ([`bind`]), so a listener does
/// not need to know its client's ephemeral port.
///
/// [`connect`]: UdpDatagramAdapter::connect
/// [`bind`]: UdpDatagramAdapter::bind
#[derive(Debug)]
pub struct UdpDatagramAdapter {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
    cfg: AdapterConfig,
    buf: Vec<u8>,
}

impl UdpDatagramAdapter {
    pub async fn bind(local: SocketAddr, cfg: AdapterConfig) -> Result<Self, AdapterError> {
        let socket = UdpSocket::bind(local).await?;
        Ok(Self {
            socket,
            peer: None,
            cfg,
            buf: vec![0; 65_535],
        })
    }

    pub async fn connect(
        local: SocketAddr,
        peer: SocketAddr,
        cfg: AdapterConfig,
    ) -> Result<Self, AdapterError> {
        let mut adapter = Self::bind(local, cfg).await?;
        adapter.peer = Some(peer);
        Ok(adapter)
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AdapterError> {
        Ok(self.socket.local_addr()?)
    }
}

impl DatagramAdapter for UdpDatagramAdapter {
    fn config(&self) -> &AdapterConfig {
        &self.cfg
    }

    async fn recv_segment(&mut self) -> Result<TcpSegment, AdapterError> {
        loop {
            let (n, from) = self.socket.recv_from(&mut self.buf).await?;
            let dgram = match Ipv4Datagram::parse(&self.buf[..n]) {
                Ok(d) => d,
                Err(e) => {
                    log::debug!("dropping undecodable datagram: {e}");
                    continue;
                }
            };
            if let Some(segment) = decode_segment(&dgram, &self.cfg) {
                self.peer.get_or_insert(from);
                return Ok(segment);
            }
        }
    }

    async fn send_segment(&mut self, segment: &TcpSegment) -> Result<(), AdapterError> {
        let Some(peer) = self.peer else {
            log::debug!("no transport peer yet; dropping outbound segment");
            return Ok(());
        };
        let payload = segment.encode(self.cfg.source, self.cfg.destination);
        let dgram = Ipv4Datagram::new(
            *self.cfg.source.ip(),
            *self.cfg.destination.ip(),
            PROTO_TCP,
            payload,
        );
        self.socket.send_to(&dgram.encode(), peer).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EthernetAdapter
// ---------------------------------------------------------------------------

/// The full encapsulation path: segments become IPv4 datagrams, the
/// [`NetworkInterface`] wraps them in Ethernet (resolving the next hop
/// via ARP), and raw frames ride a UDP tunnel to the other end.
#[derive(Debug)]
pub struct EthernetAdapter {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
    interface: NetworkInterface,
    cfg: AdapterConfig,
    buf: Vec<u8>,
    /// Frame taken off the interface but not yet confirmed sent; kept
    /// here so a future cancelled mid-send does not lose it.
    out_frame: Option<Vec<u8>>,
}

impl EthernetAdapter {
    pub async fn bind(
        local: SocketAddr,
        mac: EthernetAddress,
        cfg: AdapterConfig,
    ) -> Result<Self, AdapterError> {
        let socket = UdpSocket::bind(local).await?;
        Ok(Self {
            socket,
            peer: None,
            interface: NetworkInterface::new(mac, *cfg.source.ip()),
            cfg,
            buf: vec![0; 65_535],
            out_frame: None,
        })
    }

    pub async fn connect(
        local: SocketAddr,
        peer: SocketAddr,
        mac: EthernetAddress,
        cfg: AdapterConfig,
    ) -> Result<Self, AdapterError> {
        let mut adapter = Self::bind(local, mac, cfg).await?;
        adapter.peer = Some(peer);
        Ok(adapter)
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AdapterError> {
        Ok(self.socket.local_addr()?)
    }

    /// Push every frame the interface has ready into the tunnel.
    async fn flush_frames(&mut self) -> Result<(), AdapterError> {
        loop {
            if self.out_frame.is_none() {
                self.out_frame = self.interface.maybe_send().map(|frame| frame.encode());
            }
            let Some(bytes) = &self.out_frame else {
                return Ok(());
            };
            let Some(peer) = self.peer else {
                log::debug!("no tunnel peer yet; dropping frame");
                self.out_frame = None;
                continue;
            };
            self.socket.send_to(bytes, peer).await?;
            self.out_frame = None;
        }
    }
}

impl DatagramAdapter for EthernetAdapter {
    fn config(&self) -> &AdapterConfig {
        &self.cfg
    }

    fn tick(&mut self, ms: u64) {
        self.interface.tick(ms);
    }

    async fn recv_segment(&mut self) -> Result<TcpSegment, AdapterError> {
        loop {
            // ARP replies queued by previous frames must go out even if
            // no segment has surfaced yet.
            self.flush_frames().await?;

            let (n, from) = self.socket.recv_from(&mut self.buf).await?;
            self.peer.get_or_insert(from);
            let frame = match EthernetFrame::parse(&self.buf[..n]) {
                Ok(f) => f,
                Err(e) => {
                    log::debug!("dropping undecodable frame: {e}");
                    continue;
                }
            };
            let Some(dgram) = self.interface.recv_frame(&frame) else {
                continue;
            };
            if let Some(segment) = decode_segment(&dgram, &self.cfg) {
                return Ok(segment);
            }
        }
    }

    async fn send_segment(&mut self, segment: &TcpSegment) -> Result<(), AdapterError> {
        let payload = segment.encode(self.cfg.source, self.cfg.destination);
        let dgram = Ipv4Datagram::new(
            *self.cfg.source.ip(),
            *self.cfg.destination.ip(),
            PROTO_TCP,
            payload,
        );
        // Directly attached: the next hop is the destination itself.
        self.interface.send_datagram(dgram, *self.cfg.destination.ip());
        self.flush_frames().await
    }
}

// ---------------------------------------------------------------------------
// LossyAdapter
// ---------------------------------------------------------------------------

/// Drops a configured fraction of segments in each direction.
///
/// The RNG is seeded so a failing run can be replayed.
#[derive(Debug)]
pub struct LossyAdapter<A> {
    inner: A,
    loss_rate: f64,
    rng: StdRng,
}

impl<A: DatagramAdapter> LossyAdapter<A> {
    pub fn new(inner: A, loss_rate: f64, seed: u64) -> Self {
        Self {
            inner,
            loss_rate,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<A: DatagramAdapter + Send> DatagramAdapter for LossyAdapter<A> {
    fn config(&self) -> &AdapterConfig {
        self.inner.config()
    }

    fn tick(&mut self, ms: u64) {
        self.inner.tick(ms);
    }

    async fn recv_segment(&mut self) -> Result<TcpSegment, AdapterError> {
        loop {
            let segment = self.inner.recv_segment().await?;
            if self.rng.gen::<f64>() < self.loss_rate {
                log::debug!("lossy: dropping inbound segment");
                continue;
            }
            return Ok(segment);
        }
    }

    async fn send_segment(&mut self, segment: &TcpSegment) -> Result<(), AdapterError> {
        if self.rng.gen::<f64>() < self.loss_rate {
            log::debug!("lossy: dropping outbound segment");
            return Ok(());
        }
        self.inner.send_segment(segment).await
    }
}
