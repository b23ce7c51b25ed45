//! Error types for the instrumented dispatcher.

use thiserror::Error;

use herald_dispatch::DispatchError;
use herald_stopwatch::StopwatchError;

/// Errors raised by the tracing layer.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The configuration could not be parsed.
    #[error("Invalid trace configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// A dispatch failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A stopwatch operation failed.
    #[error("Stopwatch error: {0}")]
    Stopwatch(#[from] StopwatchError),

    /// No stopwatch is attached to the dispatcher.
    #[error("No stopwatch is attached")]
    NoStopwatch,
}

/// Result type for tracing operations.
pub type TraceResult<T> = Result<T, TraceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err: TraceError = StopwatchError::NoOpenSection.into();
        assert_eq!(
            err.to_string(),
            "Stopwatch error: There is no started section to stop"
        );
        assert_eq!(TraceError::NoStopwatch.to_string(), "No stopwatch is attached");
    }

    #[test]
    fn test_dispatch_error_is_transparent() {
        let err: TraceError = DispatchError::InvalidSubscription {
            subscriber: "Search".to_string(),
            event: "foo".to_string(),
        }
        .into();
        let inner = DispatchError::InvalidSubscription {
            subscriber: "Search".to_string(),
            event: "foo".to_string(),
        };
        assert_eq!(err.to_string(), inner.to_string());
    }
}
