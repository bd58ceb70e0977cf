//! Observability and Metrics
//!
//! This module provides in-process counters for monitoring the health of
//! the listener suite. No export surface; the daemon logs a snapshot on
//! shutdown and tests read counters directly.
//!
//! Uses atomic counters for thread-safe collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Counters for one server set, shared across its listeners and connections
#[derive(Debug)]
pub struct Metrics {
    /// Connections accepted past admission control
    pub connections_accepted: AtomicU64,
    /// Connections dropped at accept by the per-IP limit
    pub connections_rejected: AtomicU64,
    /// Connections that have fully stopped
    pub connections_closed: AtomicU64,
    /// Currently live connections
    pub connections_active: AtomicU64,
    /// Handshakes that reached the established state
    pub handshakes_completed: AtomicU64,
    /// Handshakes that failed in key exchange or derivation
    pub handshakes_failed: AtomicU64,
    /// Wire-format violations observed
    pub protocol_violations: AtomicU64,
    /// Encrypted frames delivered to handlers
    pub frames_in: AtomicU64,
    /// Frames written by handlers
    pub frames_out: AtomicU64,
    /// Payload bytes in
    pub bytes_in: AtomicU64,
    /// Payload bytes out
    pub bytes_out: AtomicU64,
    /// Handler errors (connection survives these)
    pub handler_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_accepted: AtomicU64::new(0),
            connections_rejected: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            handshakes_completed: AtomicU64::new(0),
            handshakes_failed: AtomicU64::new(0),
            protocol_violations: AtomicU64::new(0),
            frames_in: AtomicU64::new(0),
            frames_out: AtomicU64::new(0),
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            handler_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a connection admitted past the per-IP check
    pub fn connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection rejected at accept
    pub fn connection_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection fully stopped
    pub fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record an established session
    pub fn handshake_completed(&self) {
        self.handshakes_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed handshake
    pub fn handshake_failed(&self) {
        self.handshakes_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a wire-format violation
    pub fn protocol_violation(&self) {
        self.protocol_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a decoded frame handed to a handler
    pub fn frame_received(&self, byte_count: u64) {
        self.frames_in.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a frame written to a peer
    pub fn frame_sent(&self, byte_count: u64) {
        self.frames_out.fetch_add(1, Ordering::Relaxed);
        self.bytes_out.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a handler error
    pub fn handler_error(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            handshakes_completed: self.handshakes_completed.load(Ordering::Relaxed),
            handshakes_failed: self.handshakes_failed.load(Ordering::Relaxed),
            protocol_violations: self.protocol_violations.load(Ordering::Relaxed),
            frames_in: self.frames_in.load(Ordering::Relaxed),
            frames_out: self.frames_out.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_accepted = snapshot.connections_accepted,
            connections_rejected = snapshot.connections_rejected,
            connections_closed = snapshot.connections_closed,
            connections_active = snapshot.connections_active,
            handshakes_completed = snapshot.handshakes_completed,
            handshakes_failed = snapshot.handshakes_failed,
            protocol_violations = snapshot.protocol_violations,
            frames_in = snapshot.frames_in,
            frames_out = snapshot.frames_out,
            bytes_in = snapshot.bytes_in,
            bytes_out = snapshot.bytes_out,
            handler_errors = snapshot.handler_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Connection-layer metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub connections_accepted: u64,
    pub connections_rejected: u64,
    pub connections_closed: u64,
    pub connections_active: u64,
    pub handshakes_completed: u64,
    pub handshakes_failed: u64,
    pub protocol_violations: u64,
    pub frames_in: u64,
    pub frames_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub handler_errors: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}
