//! Error taxonomy shared by the coach crates.
//!
//! Collaborators return `anyhow::Result`; a `CoachError` is attached at the
//! point of failure so transports can downcast and pick a status.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoachError {
    /// A session, exercise or profile lookup came back empty.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// The backing store or the completion provider failed.
    #[error("{service} request failed: {source}")]
    ExternalService {
        service: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Malformed input.
    #[error("validation failed: {0}")]
    Validation(String),
}

impl CoachError {
    pub fn not_found(what: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            what,
            id: id.to_string(),
        }
    }

    pub fn external(service: &'static str, source: anyhow::Error) -> Self {
        Self::ExternalService {
            service,
            source: source.into(),
        }
    }

    /// Find a `CoachError` anywhere in an `anyhow` chain.
    pub fn find(err: &anyhow::Error) -> Option<&CoachError> {
        err.chain().find_map(|e| e.downcast_ref::<CoachError>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_not_found_display() {
        let err = CoachError::not_found("exercise", 42);
        assert_eq!(err.to_string(), "exercise not found: 42");
    }

    #[test]
    fn test_find_through_context() {
        let res: anyhow::Result<()> =
            Err(CoachError::not_found("session", "u1")).context("loading session");
        let err = res.unwrap_err();
        match CoachError::find(&err) {
            Some(CoachError::NotFound { what, id }) => {
                assert_eq!(*what, "session");
                assert_eq!(id, "u1");
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_find_absent() {
        let err = anyhow::anyhow!("plain failure");
        assert!(CoachError::find(&err).is_none());
    }
}
