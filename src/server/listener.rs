//! Role listener: bind, accept, admit.
//!
//! A listener owns one TCP socket and one registry. The accept loop
//! runs as a spawned task until the shutdown token fires. Each accepted
//! socket passes the per-address admission check, gets registered, and
//! is handed a fresh handshake engine plus a handler built by the
//! role's factory. Sockets over the per-address limit are dropped
//! without a single response byte.

use crate::config::ServerConfig;
use crate::crypto::DhParams;
use crate::error::Result;
use crate::handler::{HandlerFactory, Role};
use crate::metrics::Metrics;
use crate::protocol::handshake::HandshakeEngine;
use crate::server::connection::Connection;
use crate::server::registry::ConnectionRegistry;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// One bound port serving one role
pub struct Listener {
    role: Role,
    local_addr: SocketAddr,
    max_per_ip: usize,
    accept_retry_pause: Duration,
    null_key_mode: bool,
    running: AtomicBool,
    cancel: CancellationToken,
    socket: Mutex<Option<TcpListener>>,
    registry: Arc<ConnectionRegistry>,
    factory: Arc<dyn HandlerFactory>,
    params: Arc<DhParams>,
    metrics: Arc<Metrics>,
}

impl Listener {
    /// Bind the role's port from the server config.
    ///
    /// The socket is held until [`Listener::start`] launches the accept
    /// loop, so tests can bind port 0 and read the assigned address
    /// before any connection lands.
    ///
    /// # Errors
    /// `GateError::Config` for an unparseable bind address and
    /// `GateError::Io` when the bind itself fails.
    pub async fn bind(
        config: &ServerConfig,
        role: Role,
        factory: Arc<dyn HandlerFactory>,
        params: Arc<DhParams>,
        null_key_mode: bool,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let addr = SocketAddr::new(config.bind_ip()?, config.port_for(role));
        let socket = TcpListener::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        info!(role = %role, addr = %local_addr, "Listener bound");

        Ok(Self {
            role,
            local_addr,
            max_per_ip: config.max_connections_per_ip,
            accept_retry_pause: config.accept_retry_pause,
            null_key_mode,
            running: AtomicBool::new(true),
            cancel: CancellationToken::new(),
            socket: Mutex::new(Some(socket)),
            registry: Arc::new(ConnectionRegistry::new()),
            factory,
            params,
            metrics,
        })
    }

    /// Listener role
    pub fn role(&self) -> Role {
        self.role
    }

    /// Address the socket actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether `shutdown()` has not yet run
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Live connections accepted by this listener
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Registry of live connections
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Launch the accept loop. A second call is a warned no-op.
    pub fn start(self: &Arc<Self>) {
        let taken = self
            .socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(socket) = taken else {
            warn!(role = %self.role, "Listener already started");
            return;
        };
        let this = Arc::clone(self);
        tokio::spawn(this.accept_loop(socket));
    }

    /// Stop accepting and stop every live connection. Idempotent; does
    /// not wait for connection tasks to finish unwinding.
    pub fn shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.cancel.cancel();
            let live = self.registry.snapshot();
            info!(role = %self.role, connections = live.len(), "Listener shutting down");
            for conn in live {
                conn.stop();
            }
        }
    }

    #[instrument(skip_all, fields(role = %self.role, addr = %self.local_addr))]
    async fn accept_loop(self: Arc<Self>, socket: TcpListener) {
        info!("Accepting connections");
        loop {
            let accepted = tokio::select! {
                _ = self.cancel.cancelled() => break,
                res = socket.accept() => res,
            };
            match accepted {
                Ok((stream, peer)) => self.admit(stream, peer),
                Err(e) => {
                    error!(error = %e, "Accept failed, pausing");
                    tokio::time::sleep(self.accept_retry_pause).await;
                }
            }
        }
        debug!("Accept loop exited");
    }

    fn admit(self: &Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        if self.registry.count_for_ip(peer.ip()) >= self.max_per_ip {
            self.metrics.connection_rejected();
            warn!(%peer, limit = self.max_per_ip, "Per-address connection limit reached, rejecting");
            drop(stream);
            return;
        }

        let (conn, reader) =
            Connection::new(stream, peer, self.role, &self.registry, self.metrics.clone());
        self.registry.insert(conn.clone());
        self.metrics.connection_accepted();
        info!(conn_id = %conn.id(), %peer, "Connection accepted");

        let engine = HandshakeEngine::new(self.params.clone(), self.null_key_mode);
        conn.start(reader, self.factory.create(), engine);
    }
}
