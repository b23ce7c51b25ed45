//! Error types for the stopwatch.

use thiserror::Error;

/// Errors related to sections and timing periods.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StopwatchError {
    /// The section is not a child of the currently open section.
    #[error("The section \"{0}\" has been started at another level and cannot be opened")]
    SectionLevelMismatch(String),

    /// Only the root section is open.
    #[error("There is no started section to stop")]
    NoOpenSection,

    /// The event has no running period.
    #[error("Event \"{0}\" is not started")]
    NotStarted(String),
}

/// Result type for stopwatch operations.
pub type StopwatchResult<T> = std::result::Result<T, StopwatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            StopwatchError::NotStarted("foo".to_string()).to_string(),
            "Event \"foo\" is not started"
        );
        assert_eq!(
            StopwatchError::NoOpenSection.to_string(),
            "There is no started section to stop"
        );
        assert!(
            StopwatchError::SectionLevelMismatch("abc".to_string())
                .to_string()
                .contains("\"abc\"")
        );
    }
}
