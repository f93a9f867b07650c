//! End-to-end tests for the full encapsulation path: TCP segments inside
//! IPv4 datagrams inside Ethernet frames, with ARP resolving the peer's
//! hardware address through the frame tunnel.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use userspace_tcp::adapter::EthernetAdapter;
use userspace_tcp::config::{AdapterConfig, TcpConfig};
use userspace_tcp::session::TcpSession;
use userspace_tcp::wire::EthernetAddress;

const CLIENT_ADDR: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(192, 168, 0, 1), 40_000);
const SERVER_ADDR: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(192, 168, 0, 2), 8_080);

fn test_config() -> TcpConfig {
    TcpConfig {
        initial_rto_ms: 100,
        ..Default::default()
    }
}

async fn ethernet_pair() -> (EthernetAdapter, EthernetAdapter) {
    let client_cfg = AdapterConfig {
        source: CLIENT_ADDR,
        destination: SERVER_ADDR,
    };
    let server = EthernetAdapter::bind(
        "127.0.0.1:0".parse().unwrap(),
        EthernetAddress::random_private(),
        client_cfg.flipped(),
    )
    .await
    .expect("bind server adapter");
    let server_addr = server.local_addr().unwrap();
    let client = EthernetAdapter::connect(
        "127.0.0.1:0".parse().unwrap(),
        server_addr,
        EthernetAddress::random_private(),
        client_cfg,
    )
    .await
    .expect("bind client adapter");
    (client, server)
}

/// The handshake itself crosses ARP: the client's SYN waits until the
/// server answers the broadcast request for its address.
#[tokio::test]
async fn ping_pong_through_the_ethernet_path() {
    let (client_adapter, server_adapter) = ethernet_pair().await;

    let server = tokio::spawn(async move {
        let mut session = TcpSession::listen_and_accept(test_config(), server_adapter);
        let data = session.recv().await.expect("server recv");
        assert_eq!(data, b"Ping!");
        session.send(b"Pong!".to_vec()).await.expect("server send");
        session.wait_until_closed().await.expect("server close");
    });

    let client = tokio::spawn(async move {
        let mut session = TcpSession::connect(test_config(), client_adapter);
        session.send(b"Ping!".to_vec()).await.expect("client send");
        let reply = session.recv().await.expect("client recv");
        assert_eq!(reply, b"Pong!");
        session.wait_until_closed().await.expect("client close");
    });

    tokio::time::timeout(Duration::from_secs(10), async {
        let (s, c) = tokio::join!(server, client);
        s.unwrap();
        c.unwrap();
    })
    .await
    .expect("ethernet ping-pong timed out");
}

#[tokio::test]
async fn bulk_transfer_through_the_ethernet_path() {
    const TOTAL: usize = 50_000;
    let (client_adapter, server_adapter) = ethernet_pair().await;
    let payload: Vec<u8> = (0..TOTAL).map(|i| (i % 239) as u8).collect();
    let expected = payload.clone();

    let server = tokio::spawn(async move {
        let mut session = TcpSession::listen_and_accept(test_config(), server_adapter);
        let mut received = Vec::new();
        while let Some(chunk) = session.recv().await {
            received.extend_from_slice(&chunk);
        }
        session.wait_until_closed().await.expect("server close");
        received
    });

    let client = tokio::spawn(async move {
        let mut session = TcpSession::connect(test_config(), client_adapter);
        for chunk in payload.chunks(4_096) {
            session.send(chunk.to_vec()).await.expect("client send");
        }
        session.finish();
        session.wait_until_closed().await.expect("client close");
    });

    let received = tokio::time::timeout(Duration::from_secs(30), async {
        let (received, c) = tokio::join!(server, client);
        c.unwrap();
        received.unwrap()
    })
    .await
    .expect("ethernet bulk transfer timed out");

    assert_eq!(received, expected);
}
