//! `userspace-tcp` — a TCP/IP stack that runs entirely in user space.
//!
//! # Architecture
//!
//! ```text
//!  Application
//!      │  send(data) / recv()          TcpSession
//!      │                               ┌─────────────────────┐
//!      ▼                               │  send_tx (channel)  │
//!  TcpPeer                             │  recv_rx (channel)  │
//!    ├── TcpSender    (segments, RTO)  └──────────┬──────────┘
//!    ├── TcpReceiver  (acks, window)              │ worker task
//!    ├── Reassembler  (out-of-order data)         │ (10 ms tick)
//!    └── 2 × ByteStream (app byte pipes)          │
//!                                                 ▼
//!  DatagramAdapter  ── TCP-in-IPv4 ──▶  UDP tunnel, or
//!                   ── ...-in-Ethernet via NetworkInterface (ARP)
//! ```
//!
//! Each module has a single responsibility:
//! - [`byte_stream`]  — bounded byte pipe between application and stack
//! - [`wrap32`]       — 32-bit sequence number ↔ 64-bit stream index
//! - [`reassembler`]  — out-of-order substring reassembly
//! - [`receiver`]     — inbound segment handling, ack/window generation
//! - [`sender`]       — outbound segmentation and retransmission
//! - [`timer`]        — retransmit timeout bookkeeping
//! - [`segment`]      — the two message halves of a TCP segment
//! - [`wire`]         — bit-exact Ethernet / ARP / IPv4 / TCP codecs
//! - [`interface`]    — IP-in-Ethernet adaptation with ARP resolution
//! - [`router`]       — longest-prefix-match forwarding between interfaces
//! - [`peer`]         — one endpoint: sender + receiver + streams glued
//! - [`adapter`]      — datagram transports the stack runs over
//! - [`session`]      — per-endpoint worker task and application handle
//! - [`config`]       — endpoint and adapter tunables

pub mod adapter;
pub mod byte_stream;
pub mod config;
pub mod interface;
pub mod peer;
pub mod reassembler;
pub mod receiver;
pub mod router;
pub mod segment;
pub mod sender;
pub mod session;
pub mod timer;
pub mod wire;
pub mod wrap32;
