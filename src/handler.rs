//! # Role Handlers
//!
//! The seam between the connection layer and game logic.
//!
//! Each listener fronts one server role. When a connection finishes its
//! handshake, the listener's factory builds a fresh handler for it; the
//! connection task then feeds every decoded payload to that handler in
//! arrival order. Handler errors are logged and counted, but they never
//! end the connection - only the peer or an explicit `stop()` does that.
//!
//! Handlers talk back through [`ConnectionHandle`], a cheap clone that
//! can send bytes and stop the connection from any task.

use crate::error::Result;
use crate::server::connection::ConnectionHandle;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Which server a listener fronts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Hands clients off to the rest of the suite
    Launch,
    /// Account authentication
    Login,
    /// World traffic
    Map,
}

impl Role {
    /// All roles, in bring-up order
    pub const ALL: [Role; 3] = [Role::Launch, Role::Login, Role::Map];

    /// Stable lowercase name used in logs and config
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Launch => "launch",
            Role::Login => "login",
            Role::Map => "map",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-connection game-logic callbacks.
///
/// One handler instance serves exactly one connection; state kept on
/// `self` is session state.
#[async_trait]
pub trait RoleHandler: Send {
    /// Called once, right after the handshake establishes the session
    async fn on_established(&mut self, _conn: &ConnectionHandle) {}

    /// Called for every decoded payload, in arrival order.
    ///
    /// # Errors
    /// An error here is logged and counted; the connection keeps running.
    async fn handle_packet(&mut self, conn: &ConnectionHandle, payload: Vec<u8>) -> Result<()>;

    /// Called once when the connection stops, whatever the reason
    async fn on_closed(&mut self, _conn: &ConnectionHandle) {}
}

/// Builds one handler per accepted connection
pub trait HandlerFactory: Send + Sync {
    /// Create a fresh handler for a new connection
    fn create(&self) -> Box<dyn RoleHandler>;
}

impl<F> HandlerFactory for F
where
    F: Fn() -> Box<dyn RoleHandler> + Send + Sync,
{
    fn create(&self) -> Box<dyn RoleHandler> {
        self()
    }
}

/// One factory per role, consumed by the server set at startup
#[derive(Clone)]
pub struct HandlerFactorySet {
    pub launch: Arc<dyn HandlerFactory>,
    pub login: Arc<dyn HandlerFactory>,
    pub map: Arc<dyn HandlerFactory>,
}

impl HandlerFactorySet {
    /// Assemble a set from one factory per role
    pub fn new(
        launch: Arc<dyn HandlerFactory>,
        login: Arc<dyn HandlerFactory>,
        map: Arc<dyn HandlerFactory>,
    ) -> Self {
        Self { launch, login, map }
    }

    /// Use the same factory for every role
    pub fn uniform(factory: Arc<dyn HandlerFactory>) -> Self {
        Self {
            launch: factory.clone(),
            login: factory.clone(),
            map: factory,
        }
    }

    /// The factory serving a role
    pub fn for_role(&self, role: Role) -> Arc<dyn HandlerFactory> {
        match role {
            Role::Launch => self.launch.clone(),
            Role::Login => self.login.clone(),
            Role::Map => self.map.clone(),
        }
    }
}

/// Sends every payload straight back. Ships as the daemon default and
/// exercises the full pipeline in tests.
pub struct EchoHandler;

#[async_trait]
impl RoleHandler for EchoHandler {
    async fn handle_packet(&mut self, conn: &ConnectionHandle, payload: Vec<u8>) -> Result<()> {
        trace!(conn_id = %conn.id(), len = payload.len(), "Echoing payload");
        conn.send(&payload).await
    }
}

/// Factory for [`EchoHandler`]
pub struct EchoHandlerFactory;

impl HandlerFactory for EchoHandlerFactory {
    fn create(&self) -> Box<dyn RoleHandler> {
        Box::new(EchoHandler)
    }
}
