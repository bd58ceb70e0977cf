//! Connection lifecycle: handshake, frame pump, teardown.
//!
//! Each accepted socket gets one [`Connection`] and one spawned task.
//! The task walks the handshake, then loops reading encrypted frames and
//! feeding decoded payloads to the role handler. Writes from any task go
//! through a private send lock, so concurrent senders never interleave
//! their bytes on the wire.
//!
//! `stop()` is idempotent and safe from anywhere, including the
//! connection's own handler. The first call flips the running flag,
//! cancels the task's token (which unblocks a pending read), and removes
//! the connection from its registry; the socket itself closes as the
//! task unwinds. Every later call is a no-op.

use crate::crypto::SessionCipher;
use crate::error::{GateError, Result};
use crate::handler::{Role, RoleHandler};
use crate::metrics::{Metrics, Timer};
use crate::protocol::framing::{FramedChannel, SealedFrame};
use crate::protocol::handshake::HandshakeEngine;
use crate::protocol::INIT_MARKER;
use crate::server::registry::ConnectionRegistry;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier for one accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric form, for logs and maps
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One accepted socket and its lifecycle state
pub struct Connection {
    id: ConnectionId,
    peer: SocketAddr,
    role: Role,
    running: AtomicBool,
    established: AtomicBool,
    shutdown: CancellationToken,
    writer: Mutex<Option<OwnedWriteHalf>>,
    cipher: StdMutex<Option<SessionCipher>>,
    registry: Weak<ConnectionRegistry>,
    metrics: Arc<Metrics>,
}

impl Connection {
    /// Split the socket and build the connection. The read half is
    /// returned to be handed to [`Connection::start`].
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        role: Role,
        registry: &Arc<ConnectionRegistry>,
        metrics: Arc<Metrics>,
    ) -> (Arc<Self>, OwnedReadHalf) {
        let (reader, writer) = stream.into_split();
        let conn = Arc::new(Self {
            id: ConnectionId::next(),
            peer,
            role,
            running: AtomicBool::new(true),
            established: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            writer: Mutex::new(Some(writer)),
            cipher: StdMutex::new(None),
            registry: Arc::downgrade(registry),
            metrics,
        });
        (conn, reader)
    }

    /// Connection identifier
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Peer socket address
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Role of the listener that accepted this connection
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether `stop()` has not yet run
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether the handshake has completed
    pub fn is_established(&self) -> bool {
        self.established.load(Ordering::SeqCst)
    }

    /// A cheap clone handlers can hold to send and stop
    pub fn handle(self: &Arc<Self>) -> ConnectionHandle {
        ConnectionHandle {
            id: self.id,
            peer: self.peer,
            role: self.role,
            conn: Arc::downgrade(self),
        }
    }

    /// Spawn the connection task: handshake, then the frame loop.
    pub fn start(
        self: Arc<Self>,
        reader: OwnedReadHalf,
        handler: Box<dyn RoleHandler>,
        engine: HandshakeEngine,
    ) {
        tokio::spawn(self.run(reader, handler, engine));
    }

    /// Seal a payload into an encrypted frame and write it to the peer
    /// under the send lock.
    ///
    /// # Errors
    /// `GateError::TransportClosed` if the connection has stopped, the
    /// session is not yet established, or the write fails.
    pub async fn send(&self, payload: &[u8]) -> Result<()> {
        if !self.is_running() {
            return Err(GateError::TransportClosed);
        }
        let cipher = self.session_cipher().ok_or(GateError::TransportClosed)?;
        let wire = SealedFrame::seal(&cipher, payload);
        self.write_bytes(&wire).await?;
        self.metrics.frame_sent(payload.len() as u64);
        Ok(())
    }

    fn session_cipher(&self) -> Option<SessionCipher> {
        self.cipher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(GateError::TransportClosed)?;
        writer
            .write_all(bytes)
            .await
            .map_err(|_| GateError::TransportClosed)?;
        writer.flush().await.map_err(|_| GateError::TransportClosed)
    }

    /// Stop the connection. Idempotent; the first call deregisters and
    /// unblocks the task, later calls do nothing.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.shutdown.cancel();
            if let Some(registry) = self.registry.upgrade() {
                registry.remove(self.id);
            }
            self.metrics.connection_closed();
            info!(conn_id = %self.id, peer = %self.peer, role = %self.role, "Connection stopped");
        }
    }

    #[instrument(skip_all, fields(conn_id = %self.id, peer = %self.peer, role = %self.role))]
    async fn run(
        self: Arc<Self>,
        reader: OwnedReadHalf,
        mut handler: Box<dyn RoleHandler>,
        mut engine: HandshakeEngine,
    ) {
        let mut channel = FramedChannel::new(reader);
        let handle = self.handle();

        let outcome = tokio::select! {
            _ = self.shutdown.cancelled() => Ok(()),
            res = self.drive(&mut channel, &mut handler, &handle, &mut engine) => res,
        };

        match outcome {
            Ok(()) => {}
            Err(GateError::TransportClosed) => {
                info!("Peer disconnected");
            }
            Err(GateError::ProtocolViolation(detail)) => {
                self.metrics.protocol_violation();
                warn!(%detail, "Protocol violation, aborting without response");
            }
            Err(GateError::HandshakeFailed(detail)) => {
                self.metrics.handshake_failed();
                error!(%detail, "Handshake failed");
            }
            Err(e) => {
                error!(error = %e, "Connection error");
            }
        }

        self.stop();

        if self.is_established() {
            handler.on_closed(&handle).await;
        }

        // drop the write half so the socket fully closes with the task
        self.writer.lock().await.take();
    }

    async fn drive(
        &self,
        channel: &mut FramedChannel<OwnedReadHalf>,
        handler: &mut Box<dyn RoleHandler>,
        handle: &ConnectionHandle,
        engine: &mut HandshakeEngine,
    ) -> Result<()> {
        let cipher = {
            let _timer = Timer::start("handshake");
            let marker = channel.read_exact_buf(INIT_MARKER.len()).await?;
            let response = engine.on_init(&marker)?;
            self.write_bytes(&response).await?;
            let client_key = channel.read_length_prefixed().await?;
            engine.on_client_key(&client_key)?
        };

        // outbound sends need the cipher before the handler hears about us
        *self.cipher.lock().unwrap_or_else(PoisonError::into_inner) = Some(cipher.clone());
        self.metrics.handshake_completed();
        self.established.store(true, Ordering::SeqCst);
        debug!("Session established");
        handler.on_established(handle).await;

        loop {
            let frame = channel.read_encrypted_frame().await?;
            let payload = frame.open(&cipher)?;
            self.metrics.frame_received(payload.len() as u64);

            if let Err(e) = handler.handle_packet(handle, payload).await {
                self.metrics.handler_error();
                error!(error = %e, "Handler error, connection continues");
            }
        }
    }
}

/// Cheap clone of a connection's identity plus send/stop access.
///
/// Handlers receive one of these; it holds no strong reference, so a
/// stopped connection's resources are never pinned by game logic.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    peer: SocketAddr,
    role: Role,
    conn: Weak<Connection>,
}

impl ConnectionHandle {
    /// Connection identifier
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Peer socket address
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Listener role
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether the connection is still running
    pub fn is_running(&self) -> bool {
        self.conn.upgrade().map(|c| c.is_running()).unwrap_or(false)
    }

    /// Seal and send a payload under the connection's send lock.
    ///
    /// # Errors
    /// `GateError::TransportClosed` once the connection is gone.
    pub async fn send(&self, payload: &[u8]) -> Result<()> {
        match self.conn.upgrade() {
            Some(conn) => conn.send(payload).await,
            None => Err(GateError::TransportClosed),
        }
    }

    /// Stop the connection. Idempotent.
    pub fn stop(&self) {
        if let Some(conn) = self.conn.upgrade() {
            conn.stop();
        }
    }
}
