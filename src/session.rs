//! The per-endpoint worker task and its application-facing handle.
//!
//! # Architecture
//!
//! ```text
//!  Application task                     worker task (event_loop)
//!  ┌──────────────────┐   send_tx   ┌──────────────────────────┐
//!  │    TcpSession    │────────────▶│ TcpPeer + DatagramAdapter │
//!  │  send / recv /   │◀────────────│  select! {               │
//!  │ wait_until_closed│   recv_rx   │    segment from the wire │
//!  └──────────────────┘             │    bytes from the app    │
//!                                   │    10 ms tick            │
//!                                   │  }                       │
//!                                   └──────────────────────────┘
//! ```
//!
//! The worker owns every piece of per-connection state; only the two
//! byte channels and an atomic abort flag cross the task boundary.  On
//! every wake it first drains outbound segments and inbound bytes, then
//! advances the virtual clocks by the real time elapsed, so the sender's
//! RTO and the interface's ARP timers run off the same 10 ms heartbeat.
//!
//! Closing the write half (dropping `send_tx`, or [`TcpSession::finish`])
//! ends the outbound stream, which sends a FIN once the buffer drains.
//! The inbound channel closes when the peer's stream finishes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::adapter::{AdapterError, DatagramAdapter};
use crate::config::TcpConfig;
use crate::peer::TcpPeer;

/// Worker heartbeat: retransmission and ARP timers resolve to this.
const TICK_MS: u64 = 10;
/// Largest chunk handed to the application channel at once.
const READ_CHUNK: usize = 4_096;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("datagram transport failed")]
    Adapter(#[from] AdapterError),
    #[error("session is closed")]
    Closed,
    #[error("worker task failed")]
    Join(#[from] tokio::task::JoinError),
}

/// Handle to a running TCP endpoint.
pub struct TcpSession {
    send_tx: Option<mpsc::Sender<Vec<u8>>>,
    recv_rx: mpsc::Receiver<Vec<u8>>,
    abort: Arc<AtomicBool>,
    worker: Option<JoinHandle<Result<(), SessionError>>>,
}

impl TcpSession {
    /// Active open: the worker sends a SYN immediately.
    pub fn connect<A>(config: TcpConfig, adapter: A) -> Self
    where
        A: DatagramAdapter + Send + 'static,
    {
        Self::spawn(config, adapter, true)
    }

    /// Passive open: the worker waits for the peer's SYN.
    pub fn listen_and_accept<A>(config: TcpConfig, adapter: A) -> Self
    where
        A: DatagramAdapter + Send + 'static,
    {
        Self::spawn(config, adapter, false)
    }

    fn spawn<A>(config: TcpConfig, adapter: A, initiate: bool) -> Self
    where
        A: DatagramAdapter + Send + 'static,
    {
        let (send_tx, send_rx) = mpsc::channel(64);
        let (recv_tx, recv_rx) = mpsc::channel(64);
        let abort = Arc::new(AtomicBool::new(false));
        let worker = tokio::spawn(event_loop(
            config,
            adapter,
            initiate,
            send_rx,
            recv_tx,
            abort.clone(),
        ));
        Self {
            send_tx: Some(send_tx),
            recv_rx,
            abort,
            worker: Some(worker),
        }
    }

    /// Queue bytes for the peer.
    pub async fn send(&self, data: Vec<u8>) -> Result<(), SessionError> {
        let Some(tx) = &self.send_tx else {
            return Err(SessionError::Closed);
        };
        tx.send(data).await.map_err(|_| SessionError::Closed)
    }

    /// The next chunk of bytes from the peer; `None` once its stream has
    /// finished.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.recv_rx.recv().await
    }

    /// End the outbound stream (sends FIN once buffered data drains).
    /// Receiving still works.
    pub fn finish(&mut self) {
        self.send_tx = None;
    }

    /// Ask the worker to stop at its next wake, connection state be
    /// damned.
    pub fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    /// End the outbound stream and wait for the connection to wind down.
    pub async fn wait_until_closed(mut self) -> Result<(), SessionError> {
        self.send_tx = None;
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        let result = worker.await?;
        if let Err(e) = &result {
            log::warn!("tcp worker exited with error: {e}");
        }
        result
    }
}

impl Drop for TcpSession {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            if !worker.is_finished() {
                log::warn!("tcp session dropped while its worker was still running");
                self.abort.store(true, Ordering::SeqCst);
            }
        }
    }
}

async fn event_loop<A: DatagramAdapter>(
    config: TcpConfig,
    mut adapter: A,
    initiate: bool,
    mut app_rx: mpsc::Receiver<Vec<u8>>,
    app_tx: mpsc::Sender<Vec<u8>>,
    abort: Arc<AtomicBool>,
) -> Result<(), SessionError> {
    let mut peer = TcpPeer::new(&config, initiate);
    let mut app_tx = Some(app_tx);
    let mut app_open = true;
    // Overflow from an application write larger than the stream's free
    // capacity, replayed as space opens up.
    let mut backlog: Vec<u8> = Vec::new();

    if initiate {
        peer.fill_window(); // emits the SYN
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(TICK_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_wake = Instant::now();
    // TIME_WAIT stand-in: the side that closed first stays for 10 RTOs
    // after both streams finish, re-acking any retransmitted FIN.
    let linger = Duration::from_millis(10 * config.initial_rto_ms);
    let mut linger_deadline: Option<Instant> = None;

    loop {
        // Outbound segments first: acks owed from the previous wake must
        // not wait a full tick.
        while let Some(segment) = peer.maybe_send() {
            adapter.send_segment(&segment).await?;
        }

        // Reassembled bytes toward the application.  `try_reserve` keeps
        // the worker from blocking on a slow reader: bytes stay in the
        // inbound stream and shrink the advertised window instead.
        let mut reader_gone = false;
        loop {
            if peer.inbound_buffered() == 0 {
                break;
            }
            let Some(tx) = app_tx.as_ref() else { break };
            match tx.try_reserve() {
                Ok(permit) => permit.send(peer.read_inbound(READ_CHUNK)),
                Err(TrySendError::Full(())) => break,
                Err(TrySendError::Closed(())) => {
                    reader_gone = true;
                    break;
                }
            }
        }
        if reader_gone {
            app_tx = None;
        }
        if peer.inbound_buffered() == 0 && (peer.inbound_finished() || peer.has_error()) {
            app_tx = None; // half-close toward the application
        }

        // Replay write overflow as stream capacity opens.
        while !backlog.is_empty() && peer.outbound_capacity() > 0 {
            let n = peer.write(&backlog);
            backlog.drain(..n);
        }

        if abort.load(Ordering::SeqCst) {
            log::debug!("worker aborting on request");
            break;
        }
        if !peer.active() {
            if peer.has_error() || !peer.linger_after_close() {
                break;
            }
            match linger_deadline {
                None => linger_deadline = Some(Instant::now() + linger),
                Some(deadline) if Instant::now() >= deadline => break,
                Some(_) => {}
            }
        }

        tokio::select! {
            result = adapter.recv_segment() => {
                peer.receive(result?);
            }
            received = app_rx.recv(), if app_open && backlog.is_empty() && peer.outbound_capacity() > 0 => {
                match received {
                    Some(data) => {
                        let n = peer.write(&data);
                        if n < data.len() {
                            backlog.extend_from_slice(&data[n..]);
                        }
                    }
                    None => {
                        app_open = false;
                        peer.close_outbound();
                    }
                }
            }
            _ = ticker.tick() => {}
        }

        let now = Instant::now();
        let elapsed = now.duration_since(last_wake).as_millis() as u64;
        last_wake = now;
        peer.tick(elapsed);
        adapter.tick(elapsed);

        if peer.consecutive_retransmissions() > config.max_retx_attempts {
            log::warn!(
                "giving up after {} consecutive retransmissions",
                peer.consecutive_retransmissions()
            );
            peer.fail();
        }
    }

    // A final ack (typically of the peer's FIN) may still be owed.
    while let Some(segment) = peer.maybe_send() {
        adapter.send_segment(&segment).await?;
    }
    Ok(())
}
