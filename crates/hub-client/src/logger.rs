//! Leveled logging collaborator for publish failures.
//!
//! The publisher reports each failed attempt through a [`HubLogger`]. The
//! default [`TracingLogger`] forwards to `tracing`, which discards events when
//! the host application installed no subscriber.

use std::fmt::Debug;

/// Sink for human-readable publish diagnostics.
pub trait HubLogger: Send + Sync + Debug {
    /// Informational message.
    fn info(&self, message: &str);

    /// A failed attempt or other recoverable problem.
    fn warn(&self, message: &str);

    /// An unrecoverable problem.
    fn error(&self, message: &str);
}

/// Forwards messages to `tracing` under the `hub_client` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl HubLogger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "hub_client", "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "hub_client", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "hub_client", "{message}");
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl HubLogger for NoopLogger {
    fn info(&self, _message: &str) {}

    fn warn(&self, _message: &str) {}

    fn error(&self, _message: &str) {}
}
