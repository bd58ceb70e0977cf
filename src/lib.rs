//! # Gatenet
//!
//! Encrypted connection and handshake layer for a multiplayer game
//! server suite.
//!
//! Gatenet runs the three front-door TCP listeners of a game cluster
//! (launch, login, map), walks each client through a Diffie-Hellman
//! key exchange, and pumps length-framed encrypted packets into
//! role-specific handlers supplied by the embedding application.
//!
//! ## Features
//! - **Three-role listener suite** with all-or-nothing start-up
//! - **Per-session key exchange** over a fixed 2048-bit MODP group
//! - **Block-cipher sessions** with zero-padded 16-byte blocks
//! - **Per-address admission limits** enforced before the handshake
//! - **Injected role handlers** behind an async trait seam
//! - **Idempotent teardown** at connection, listener, and suite level
//!
//! ## Session Establishment
//! ```text
//! client                                server
//!   | -- init marker (8 bytes) ----------> |
//!   | <-- generator, prime, public key --- |   three length-prefixed fields
//!   | -- client public key --------------> |   one length-prefixed field
//!   | == encrypted frames both ways ====== |
//! ```
//!
//! Every subsequent frame is `[u32 ciphertext len][u32 payload len]`
//! followed by whole 16-byte ciphertext blocks; see [`protocol`] for
//! the exact layout.
//!
//! ## Quick Start
//! ```rust,no_run
//! use gatenet::config::GateConfig;
//! use gatenet::handler::{EchoHandlerFactory, HandlerFactorySet};
//! use gatenet::server::ServerSet;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GateConfig::from_env()?;
//!     config.validate_strict()?;
//!
//!     let factories = HandlerFactorySet::uniform(Arc::new(EchoHandlerFactory));
//!     let servers = ServerSet::new(config, factories);
//!     servers.start_all().await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     servers.shutdown_all();
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//! - [`server`]: listener suite, accept loops, connection lifecycle
//! - [`protocol`]: wire framing and the handshake state machine
//! - [`crypto`]: key exchange and the per-session block cipher
//! - [`handler`]: the trait seam game logic plugs into
//! - [`config`]: TOML and environment configuration
//! - [`metrics`]: cheap atomic counters for operations visibility

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod config;
pub mod crypto;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod protocol;
pub mod server;

pub use config::GateConfig;
pub use error::{GateError, Result};
pub use handler::{HandlerFactory, HandlerFactorySet, Role, RoleHandler};
pub use server::{ConnectionHandle, ServerSet};
