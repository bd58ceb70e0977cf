#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! End-to-end key exchange and session tests over real sockets.

mod support;

use gatenet::crypto::{SessionCipher, SessionKey};
use gatenet::handler::Role;
use gatenet::protocol::{framing, INIT_MARKER};
use support::{read_field, TestClient};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_handshake_and_echo() {
    let suite = support::start_echo_suite().await;
    let addr = suite.listener(Role::Login).unwrap().local_addr();

    let mut client = TestClient::establish(addr).await;
    for payload in [
        &b"hello"[..],
        &[0xAB; 16][..],
        &[0x01; 100][..],
        &vec![0x77; 4096][..],
    ] {
        assert_eq!(client.echo(payload).await, payload);
    }

    suite.shutdown_all();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_all_three_roles_establish_sessions() {
    let suite = support::start_echo_suite().await;

    for role in Role::ALL {
        let addr = suite.listener(role).unwrap().local_addr();
        let mut client = TestClient::establish(addr).await;
        let back = client.echo(role.as_str().as_bytes()).await;
        assert_eq!(back, role.as_str().as_bytes());
    }

    suite.shutdown_all();
}

#[tokio::test]
async fn test_key_exchange_response_shape() {
    let suite = support::start_echo_suite().await;
    let addr = suite.listener(Role::Launch).unwrap().local_addr();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&INIT_MARKER).await.unwrap();

    let generator = read_field(&mut stream).await;
    let prime = read_field(&mut stream).await;
    let server_public = read_field(&mut stream).await;

    assert_eq!(generator, b"2");
    assert_eq!(prime.len(), 256);
    assert_ne!(prime[0], 0, "prime travels without leading zeros");
    assert!(!server_public.is_empty());
    assert!(server_public.len() <= 256);

    suite.shutdown_all();
}

#[tokio::test]
async fn test_bad_init_marker_gets_no_response() {
    let suite = support::start_echo_suite().await;
    let addr = suite.listener(Role::Login).unwrap().local_addr();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&[0xDE; 8]).await.unwrap();

    assert!(
        support::closed_without_bytes(&mut stream).await,
        "a bad marker must be answered with silence"
    );
    support::wait_for_connections(&suite, 0).await;

    suite.shutdown_all();
}

#[tokio::test]
async fn test_marker_off_by_one_is_rejected() {
    let suite = support::start_echo_suite().await;
    let addr = suite.listener(Role::Login).unwrap().local_addr();

    let mut almost = INIT_MARKER;
    almost[7] ^= 0x01;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&almost).await.unwrap();
    assert!(support::closed_without_bytes(&mut stream).await);

    suite.shutdown_all();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_listener_survives_rejected_clients() {
    let suite = support::start_echo_suite().await;
    let addr = suite.listener(Role::Map).unwrap().local_addr();

    for _ in 0..5 {
        let mut bad = TcpStream::connect(addr).await.unwrap();
        bad.write_all(&[0xFF; 8]).await.unwrap();
        assert!(support::closed_without_bytes(&mut bad).await);
    }

    // the accept loop is unharmed
    let mut client = TestClient::establish(addr).await;
    assert_eq!(client.echo(b"still alive").await, b"still alive");

    suite.shutdown_all();
}

#[tokio::test]
async fn test_null_key_session_when_enabled() {
    let suite = support::start_null_key_echo_suite().await;
    let addr = suite.listener(Role::Login).unwrap().local_addr();

    let mut client = TestClient::establish_null_key(addr).await;
    assert_eq!(client.echo(b"unencrypted era").await, b"unencrypted era");

    suite.shutdown_all();
}

#[tokio::test]
async fn test_null_key_accepts_all_zero_bytes_field() {
    let suite = support::start_null_key_echo_suite().await;
    let addr = suite.listener(Role::Login).unwrap().local_addr();

    // a run of zero bytes decodes to the integer zero, same as empty
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&INIT_MARKER).await.unwrap();
    let _ = read_field(&mut stream).await;
    let _ = read_field(&mut stream).await;
    let _ = read_field(&mut stream).await;
    stream
        .write_all(&framing::encode_field(&[0u8; 64]))
        .await
        .unwrap();

    let mut client = TestClient {
        stream,
        cipher: SessionCipher::new(&SessionKey::zero()),
    };
    assert_eq!(client.echo(b"zeros").await, b"zeros");

    suite.shutdown_all();
}

#[tokio::test]
async fn test_null_key_accepts_ascii_zero_sentinel() {
    let suite = support::start_null_key_echo_suite().await;
    let addr = suite.listener(Role::Login).unwrap().local_addr();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&INIT_MARKER).await.unwrap();
    let _ = read_field(&mut stream).await;
    let _ = read_field(&mut stream).await;
    let _ = read_field(&mut stream).await;
    // the one-byte field holding the digit '0', exactly as clients send it
    stream
        .write_all(&framing::encode_field(b"0"))
        .await
        .unwrap();

    let mut client = TestClient {
        stream,
        cipher: SessionCipher::new(&SessionKey::zero()),
    };
    assert_eq!(client.echo(b"legacy client").await, b"legacy client");

    suite.shutdown_all();
}

#[tokio::test]
async fn test_null_key_rejects_real_key_bytes() {
    let suite = support::start_null_key_echo_suite().await;
    let addr = suite.listener(Role::Login).unwrap().local_addr();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&INIT_MARKER).await.unwrap();
    let _ = read_field(&mut stream).await;
    let _ = read_field(&mut stream).await;
    let _ = read_field(&mut stream).await;
    // an actual public key is not the sentinel while the exchange is off
    stream
        .write_all(&framing::encode_field(&[0x42; 32]))
        .await
        .unwrap();

    assert!(support::closed_without_bytes(&mut stream).await);
    suite.shutdown_all();
}

#[tokio::test]
async fn test_zero_key_rejected_in_normal_mode() {
    let suite = support::start_echo_suite().await;
    let addr = suite.listener(Role::Login).unwrap().local_addr();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&INIT_MARKER).await.unwrap();
    let _ = read_field(&mut stream).await;
    let _ = read_field(&mut stream).await;
    let _ = read_field(&mut stream).await;
    stream
        .write_all(&framing::encode_field(&[]))
        .await
        .unwrap();

    assert!(
        support::closed_without_bytes(&mut stream).await,
        "a zero public key is degenerate when the exchange is on"
    );
    suite.shutdown_all();
}
