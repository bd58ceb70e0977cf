//! # Server Runtime
//!
//! Listeners, connections, and their shared registry.
//!
//! ## Layers
//! - [`server_set`]: the three-role suite under one lifecycle
//! - [`listener`]: one bound port, its accept loop, and admission
//! - [`registry`]: mutex-guarded table of live connections
//! - [`connection`]: per-socket handshake and frame pump
//!
//! Every accepted connection runs as its own task and deregisters
//! itself on stop, so a registry holds exactly the running connections
//! at any point the lock is free.

pub mod connection;
pub mod listener;
pub mod registry;
pub mod server_set;

pub use connection::{Connection, ConnectionHandle, ConnectionId};
pub use listener::Listener;
pub use registry::ConnectionRegistry;
pub use server_set::ServerSet;
