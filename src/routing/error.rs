//! Routing error types

use thiserror::Error;

/// The configuration could not be turned into a routing table.
///
/// Any of these rejects the whole candidate table; the previously published
/// table stays in service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigShapeError {
    /// The config source holds no routing document.
    #[error("config source has no routing document")]
    MissingDocument,

    #[error("rule {index}: routing key is empty")]
    EmptyKey { index: usize },

    /// Keys are `org` or `org/repo` with non-empty segments.
    #[error("rule {index}: malformed routing key '{key}'")]
    MalformedKey { index: usize, key: String },

    #[error("rule {index}: exclusion key '{key}' must be of the form org/repo")]
    ExclusionNotRepository { index: usize, key: String },

    #[error("rule {index} ({key}): empty event type")]
    EmptyEventType { index: usize, key: String },

    #[error("rule {index} ({key}): empty destination for event '{event}'")]
    EmptyDestination {
        index: usize,
        key: String,
        event: String,
    },
}

impl ConfigShapeError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingDocument => "missing_document",
            Self::EmptyKey { .. } => "empty_key",
            Self::MalformedKey { .. } => "malformed_key",
            Self::ExclusionNotRepository { .. } => "exclusion_not_repository",
            Self::EmptyEventType { .. } => "empty_event_type",
            Self::EmptyDestination { .. } => "empty_destination",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigShapeError::MalformedKey {
            index: 2,
            key: "a/b/c".into(),
        };
        assert_eq!(err.to_string(), "rule 2: malformed routing key 'a/b/c'");

        let err = ConfigShapeError::EmptyDestination {
            index: 0,
            key: "org".into(),
            event: "push".into(),
        };
        assert!(err.to_string().contains("push"));
        assert_eq!(err.kind(), "empty_destination");
    }
}
