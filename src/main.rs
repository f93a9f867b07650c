//! Entry point for `userspace-tcp`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client**
//! mode, talking TCP-in-IPv4 over a UDP tunnel.  All protocol work is
//! delegated to library modules; `main.rs` owns only process setup
//! (logging, argument parsing) and the demo echo application.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use anyhow::Result;
use clap::{Parser, Subcommand};

use userspace_tcp::adapter::UdpDatagramAdapter;
use userspace_tcp::config::{AdapterConfig, TcpConfig};
use userspace_tcp::session::TcpSession;

/// Addresses of the two endpoints as seen inside the tunnel.
const CLIENT_ADDR: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(172, 16, 0, 1), 50_000);
const SERVER_ADDR: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(172, 16, 0, 2), 1_200);

/// A user-space TCP/IP stack speaking through a UDP tunnel.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Accept one connection and echo everything back.
    Server {
        /// UDP address to bind (e.g. 0.0.0.0:9000).
        #[arg(short, long, default_value = "0.0.0.0:9000")]
        bind: SocketAddr,
    },
    /// Connect to a server, send a message, print the echo.
    Client {
        /// Remote server UDP address (e.g. 127.0.0.1:9000).
        #[arg(short, long)]
        server: SocketAddr,
        /// Payload to send.
        #[arg(short, long, default_value = "hello from userspace-tcp")]
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    match cli.mode {
        Mode::Server { bind } => run_server(bind).await,
        Mode::Client { server, message } => run_client(server, message).await,
    }
}

async fn run_server(bind: SocketAddr) -> Result<()> {
    let cfg = AdapterConfig {
        source: SERVER_ADDR,
        destination: CLIENT_ADDR,
    };
    let adapter = UdpDatagramAdapter::bind(bind, cfg).await?;
    log::info!("listening on {bind}");

    let mut session = TcpSession::listen_and_accept(TcpConfig::default(), adapter);
    while let Some(chunk) = session.recv().await {
        log::info!("echoing {} bytes", chunk.len());
        session.send(chunk).await?;
    }
    session.wait_until_closed().await?;
    log::info!("connection closed");
    Ok(())
}

async fn run_client(server: SocketAddr, message: String) -> Result<()> {
    let cfg = AdapterConfig {
        source: CLIENT_ADDR,
        destination: SERVER_ADDR,
    };
    let adapter =
        UdpDatagramAdapter::connect("0.0.0.0:0".parse()?, server, cfg).await?;
    log::info!("connecting to {server}");

    let mut session = TcpSession::connect(TcpConfig::default(), adapter);
    session.send(message.clone().into_bytes()).await?;
    session.finish();

    let mut echoed = Vec::new();
    while echoed.len() < message.len() {
        match session.recv().await {
            Some(chunk) => echoed.extend_from_slice(&chunk),
            None => break,
        }
    }
    println!("{}", String::from_utf8_lossy(&echoed));
    session.wait_until_closed().await?;
    Ok(())
}
