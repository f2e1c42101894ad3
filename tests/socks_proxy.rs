//! End-to-end tests against a listener on loopback

mod common;

use common::{socks5_mock, spawn_echo_server, TestProxy};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn read_to_end(stream: &mut TcpStream) -> Vec<u8> {
    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut out))
        .await
        .unwrap()
        .unwrap();
    out
}

#[tokio::test]
async fn test_connect_ipv4_and_echo() {
    let echo = spawn_echo_server().await;
    let proxy = TestProxy::start(&[]).await;

    let mut client = proxy.connect().await;
    client
        .write_all(&socks5_mock::create_connect_ipv4([127, 0, 0, 1], echo.port()))
        .await
        .unwrap();

    let mut reply = [0u8; 10];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply[..4], &[5, 0, 0, 1]);
    assert_eq!(&reply[4..8], &[127, 0, 0, 1]);

    client.write_all(b"ping through the proxy").await.unwrap();
    let mut buf = [0u8; 22];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping through the proxy");

    proxy.stop().await;
}

#[tokio::test]
async fn test_connect_domain_with_early_data() {
    let echo = spawn_echo_server().await;
    let proxy = TestProxy::start(&[("echo.test", Ipv4Addr::LOCALHOST)]).await;

    let mut client = proxy.connect().await;
    let mut request = socks5_mock::create_connect_domain("echo.test", echo.port());
    request.extend_from_slice(b"early");
    client.write_all(&request).await.unwrap();

    let mut reply = [0u8; 10];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply[1], 0);

    let mut buf = [0u8; 5];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"early");

    proxy.stop().await;
}

#[tokio::test]
async fn test_resolve() {
    let proxy = TestProxy::start(&[("example.com", Ipv4Addr::new(5, 6, 7, 8))]).await;

    let mut client = proxy.connect().await;
    client
        .write_all(&socks5_mock::create_resolve("example.com"))
        .await
        .unwrap();
    assert_eq!(read_to_end(&mut client).await, vec![5, 0, 0, 1, 5, 6, 7, 8]);

    let mut client = proxy.connect().await;
    client
        .write_all(&socks5_mock::create_resolve("nowhere.test"))
        .await
        .unwrap();
    assert_eq!(read_to_end(&mut client).await, vec![5, 4, 0, 0]);

    proxy.stop().await;
}

#[tokio::test]
async fn test_connect_refused() {
    // Grab a free port, then close it again
    let port = {
        let (listener, addr) = common::create_test_listener().await;
        drop(listener);
        addr.port()
    };
    let proxy = TestProxy::start(&[]).await;

    let mut client = proxy.connect().await;
    client
        .write_all(&socks5_mock::create_connect_ipv4([127, 0, 0, 1], port))
        .await
        .unwrap();

    let reply = read_to_end(&mut client).await;
    assert_eq!(reply, vec![5, 5, 0, 1, 0, 0, 0, 0, 0, 0]);

    proxy.stop().await;
}

#[tokio::test]
async fn test_target_close_closes_client() {
    let (target, addr) = common::create_test_listener().await;
    let proxy = TestProxy::start(&[]).await;

    let mut client = proxy.connect().await;
    client
        .write_all(&socks5_mock::create_connect_ipv4([127, 0, 0, 1], addr.port()))
        .await
        .unwrap();

    let (accepted, _) = target.accept().await.unwrap();
    let mut reply = [0u8; 10];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply[1], 0);

    drop(accepted);
    assert!(read_to_end(&mut client).await.is_empty());

    proxy.stop().await;
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let proxy = TestProxy::start(&[("example.com", Ipv4Addr::new(5, 6, 7, 8))]).await;

    // A broken client must not disturb the next one
    let mut bad = TcpStream::connect(proxy.addr).await.unwrap();
    bad.write_all(&[4, 1, 0, 80]).await.unwrap();
    assert!(read_to_end(&mut bad).await.is_empty());

    let mut client = proxy.connect().await;
    client
        .write_all(&socks5_mock::create_resolve("example.com"))
        .await
        .unwrap();
    assert_eq!(read_to_end(&mut client).await, vec![5, 0, 0, 1, 5, 6, 7, 8]);

    proxy.stop().await;
}
