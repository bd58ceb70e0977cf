//! Client-side helpers shared by the integration tests.
//!
//! These speak the wire protocol from the client's seat: init marker,
//! key-exchange fields, then sealed frames. Reads are wrapped in
//! timeouts so a broken server fails the test instead of hanging it.

#![allow(dead_code)]

use gatenet::config::GateConfig;
use gatenet::crypto::{derive_keypair, derive_session_key, DhParams, SessionCipher, SessionKey};
use gatenet::handler::{EchoHandlerFactory, HandlerFactorySet};
use gatenet::protocol::{framing, INIT_MARKER};
use gatenet::server::ServerSet;
use num_bigint::BigUint;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Config that binds every role to an ephemeral loopback port
pub fn loopback_config() -> GateConfig {
    GateConfig::default_with_overrides(|c| {
        c.server.bind_address = "127.0.0.1".to_string();
        c.server.launch_port = 0;
        c.server.login_port = 0;
        c.server.map_port = 0;
    })
}

/// Started echo suite on ephemeral ports
pub async fn start_echo_suite() -> ServerSet {
    start_suite_with(loopback_config(), HandlerFactorySet::uniform(Arc::new(EchoHandlerFactory)))
        .await
}

/// Started echo suite running in null-key mode
pub async fn start_null_key_echo_suite() -> ServerSet {
    let mut config = loopback_config();
    config.security.null_key_mode = true;
    start_suite_with(config, HandlerFactorySet::uniform(Arc::new(EchoHandlerFactory))).await
}

/// Started suite with custom config and factories
pub async fn start_suite_with(config: GateConfig, factories: HandlerFactorySet) -> ServerSet {
    let set = ServerSet::new(config, factories);
    set.start_all().await.expect("suite should start on loopback");
    set
}

pub async fn read_exact_timed(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    timeout(READ_TIMEOUT, stream.read_exact(&mut buf))
        .await
        .expect("read timed out")
        .expect("read failed");
    buf
}

/// One `[u32 len][payload]` field off the wire
pub async fn read_field(stream: &mut TcpStream) -> Vec<u8> {
    let len_bytes = read_exact_timed(stream, 4).await;
    let len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]);
    read_exact_timed(stream, len as usize).await
}

/// True when the peer closes without sending a byte
pub async fn closed_without_bytes(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 1];
    matches!(
        timeout(READ_TIMEOUT, stream.read(&mut buf)).await,
        Ok(Ok(0)) | Ok(Err(_))
    )
}

/// An established session from the client's side
pub struct TestClient {
    pub stream: TcpStream,
    pub cipher: SessionCipher,
}

impl TestClient {
    /// Connect and run the full key exchange.
    pub async fn establish(addr: SocketAddr) -> Self {
        let mut stream = TcpStream::connect(addr).await.expect("connect failed");
        stream
            .write_all(&INIT_MARKER)
            .await
            .expect("marker write failed");

        let generator_field = read_field(&mut stream).await;
        let prime_field = read_field(&mut stream).await;
        let server_public_field = read_field(&mut stream).await;

        let generator = String::from_utf8(generator_field)
            .expect("generator field should be ASCII")
            .parse::<u32>()
            .expect("generator field should be a decimal integer");
        let params = DhParams {
            prime: BigUint::from_bytes_be(&prime_field),
            generator: BigUint::from(generator),
        };
        let server_public = BigUint::from_bytes_be(&server_public_field);

        let keypair = derive_keypair(&params).expect("client keypair");
        stream
            .write_all(&framing::encode_field(&keypair.public_bytes()))
            .await
            .expect("client key write failed");

        let shared = keypair
            .shared_secret(&server_public, &params)
            .expect("shared secret");
        let cipher = SessionCipher::new(&derive_session_key(&shared));

        Self { stream, cipher }
    }

    /// Connect and claim the null key instead of exchanging one.
    pub async fn establish_null_key(addr: SocketAddr) -> Self {
        let mut stream = TcpStream::connect(addr).await.expect("connect failed");
        stream
            .write_all(&INIT_MARKER)
            .await
            .expect("marker write failed");

        // key-exchange fields still arrive; the client ignores them
        let _generator = read_field(&mut stream).await;
        let _prime = read_field(&mut stream).await;
        let _server_public = read_field(&mut stream).await;

        // the ASCII digit "0" is the sentinel clients send in this mode
        stream
            .write_all(&framing::encode_field(b"0"))
            .await
            .expect("null key write failed");

        Self {
            stream,
            cipher: SessionCipher::new(&SessionKey::zero()),
        }
    }

    pub async fn send_payload(&mut self, payload: &[u8]) {
        let wire = framing::SealedFrame::seal(&self.cipher, payload);
        self.stream.write_all(&wire).await.expect("frame write failed");
    }

    pub async fn read_payload(&mut self) -> Vec<u8> {
        let len_bytes = read_exact_timed(&mut self.stream, 4).await;
        let ct_len =
            u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
        let header = read_exact_timed(&mut self.stream, 4).await;
        let ciphertext = read_exact_timed(&mut self.stream, ct_len).await;

        let frame = framing::SealedFrame {
            header: [header[0], header[1], header[2], header[3]],
            ciphertext,
        };
        frame.open(&self.cipher).expect("frame should decode")
    }

    /// Round-trip one payload through the echo handler.
    pub async fn echo(&mut self, payload: &[u8]) -> Vec<u8> {
        self.send_payload(payload).await;
        self.read_payload().await
    }
}

/// Poll until the suite's live-connection count settles at `expected`.
pub async fn wait_for_connections(set: &ServerSet, expected: usize) {
    for _ in 0..200 {
        if set.connection_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(set.connection_count(), expected, "connection count never settled");
}
