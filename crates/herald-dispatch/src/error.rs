//! Error types for the listener registry.
//!
//! Listener failures are carried through dispatch unchanged; the registry
//! only attaches the event and listener the failure came from.

use thiserror::Error;

/// Error returned by a listener callback.
///
/// Listeners may fail with any error type; it is boxed so that the
/// dispatcher can carry it back to the caller without inspecting it.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type returned by listener callbacks.
pub type ListenerResult = std::result::Result<(), ListenerError>;

/// Errors raised by the registry while registering or dispatching.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A listener returned an error while handling an event.
    #[error("Listener \"{listener}\" failed on event \"{event}\": {source}")]
    ListenerFailed {
        /// The event being dispatched.
        event: String,
        /// Description of the failing listener.
        listener: String,
        /// The error returned by the listener.
        #[source]
        source: ListenerError,
    },

    /// A subscriber described an event without any listener method.
    #[error("Invalid subscription from {subscriber}: event \"{event}\" maps to no method")]
    InvalidSubscription {
        /// Type name of the subscriber.
        subscriber: String,
        /// The event with the empty mapping.
        event: String,
    },
}

impl DispatchError {
    /// Get the name of the event this error relates to.
    pub fn event(&self) -> &str {
        match self {
            DispatchError::ListenerFailed { event, .. } => event,
            DispatchError::InvalidSubscription { event, .. } => event,
        }
    }

    /// Check whether the error came from a listener.
    pub fn is_listener_failure(&self) -> bool {
        matches!(self, DispatchError::ListenerFailed { .. })
    }
}

/// Result type alias for registry operations.
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_failed_display() {
        let err = DispatchError::ListenerFailed {
            event: "foo".to_string(),
            listener: "closure".to_string(),
            source: "boom".into(),
        };

        assert_eq!(
            err.to_string(),
            "Listener \"closure\" failed on event \"foo\": boom"
        );
        assert_eq!(err.event(), "foo");
        assert!(err.is_listener_failure());
    }

    #[test]
    fn test_invalid_subscription_display() {
        let err = DispatchError::InvalidSubscription {
            subscriber: "Mailer".to_string(),
            event: "bar".to_string(),
        };

        assert!(err.to_string().contains("\"bar\""));
        assert!(!err.is_listener_failure());
    }
}
