//! The three-role listener suite.
//!
//! A [`ServerSet`] owns one listener per role, bound and started in
//! bring-up order (launch, login, map). If any bind fails, listeners
//! already up are torn down and the error propagates, so start-up is
//! all-or-nothing. All listeners share one metrics sink and one DH
//! group.

use crate::config::GateConfig;
use crate::crypto::DhParams;
use crate::error::Result;
use crate::handler::{HandlerFactorySet, Role};
use crate::metrics::Metrics;
use crate::server::listener::Listener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};

/// All role listeners under one lifecycle
pub struct ServerSet {
    config: GateConfig,
    params: Arc<DhParams>,
    factories: HandlerFactorySet,
    metrics: Arc<Metrics>,
    running: AtomicBool,
    listeners: Mutex<Vec<Arc<Listener>>>,
}

impl ServerSet {
    /// Build an idle set. Nothing binds until [`ServerSet::start_all`].
    pub fn new(config: GateConfig, factories: HandlerFactorySet) -> Self {
        Self {
            config,
            params: Arc::new(DhParams::modp_2048()),
            factories,
            metrics: Arc::new(Metrics::new()),
            running: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn listeners_lock(&self) -> MutexGuard<'_, Vec<Arc<Listener>>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The configuration the set was built with
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Shared metrics sink
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Whether `start_all` succeeded and `shutdown_all` has not run
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The started listener for a role, if any
    pub fn listener(&self, role: Role) -> Option<Arc<Listener>> {
        self.listeners_lock()
            .iter()
            .find(|l| l.role() == role)
            .cloned()
    }

    /// Live connections across all role listeners
    pub fn connection_count(&self) -> usize {
        self.listeners_lock()
            .iter()
            .map(|l| l.connection_count())
            .sum()
    }

    /// Bind and start every role listener.
    ///
    /// # Errors
    /// The first bind failure; listeners bound before it are shut down
    /// and the set stays stopped.
    pub async fn start_all(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Server set already running");
            return Ok(());
        }
        if self.config.security.null_key_mode {
            warn!("Null-key mode is enabled - sessions are effectively unencrypted");
        }

        let mut bound: Vec<Arc<Listener>> = Vec::with_capacity(Role::ALL.len());
        for role in Role::ALL {
            let listener = match Listener::bind(
                &self.config.server,
                role,
                self.factories.for_role(role),
                self.params.clone(),
                self.config.security.null_key_mode,
                self.metrics.clone(),
            )
            .await
            {
                Ok(listener) => Arc::new(listener),
                Err(e) => {
                    error!(role = %role, error = %e, "Bind failed, tearing down started listeners");
                    for started in &bound {
                        started.shutdown();
                    }
                    self.running.store(false, Ordering::SeqCst);
                    return Err(e);
                }
            };
            listener.start();
            bound.push(listener);
        }

        info!(listeners = bound.len(), "Server set running");
        *self.listeners_lock() = bound;
        Ok(())
    }

    /// Shut down every listener and every live connection. Idempotent;
    /// returns without waiting for connection tasks to finish.
    pub fn shutdown_all(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            let listeners = std::mem::take(&mut *self.listeners_lock());
            info!(listeners = listeners.len(), "Server set shutting down");
            for listener in &listeners {
                listener.shutdown();
            }
            self.metrics.log_metrics();
        }
    }
}
