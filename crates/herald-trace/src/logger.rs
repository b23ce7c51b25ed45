//! Debug loggers receiving the dispatcher's decisions.
//!
//! The instrumented dispatcher reports each notification, stop and skip as a
//! single human-readable message through a [`DebugLogger`].

use parking_lot::RwLock;

/// Tracing target used by [`TracingLogger`].
pub const LOG_TARGET: &str = "herald::event";

/// Sink for dispatch debug messages.
pub trait DebugLogger: Send + Sync {
    /// Record a debug message.
    fn debug(&self, message: &str);
}

/// Forwards messages to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl TracingLogger {
    /// Create a new tracing logger.
    pub fn new() -> Self {
        Self
    }
}

impl DebugLogger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(target: LOG_TARGET, "{}", message);
    }
}

/// Keeps messages in memory, up to a limit.
pub struct CollectingLogger {
    messages: RwLock<Vec<String>>,
    max_messages: usize,
}

impl CollectingLogger {
    /// Create a logger keeping at most `max_messages` messages.
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: RwLock::new(Vec::new()),
            max_messages,
        }
    }

    /// Collected messages, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.messages.read().clone()
    }

    /// Drop every collected message.
    pub fn clear(&self) {
        self.messages.write().clear();
    }

    /// Number of collected messages.
    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    /// Check if no message was collected.
    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}

impl Default for CollectingLogger {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl DebugLogger for CollectingLogger {
    fn debug(&self, message: &str) {
        let mut messages = self.messages.write();
        if messages.len() < self.max_messages {
            messages.push(message.to_string());
        }
    }
}

impl std::fmt::Debug for CollectingLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectingLogger")
            .field("messages", &self.len())
            .field("max_messages", &self.max_messages)
            .finish()
    }
}
