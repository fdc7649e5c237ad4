//! Error types for the audit engine.
//!
//! Only `FatalCrawl` (and `Cancelled`, when the caller asks for it) ever leave
//! the orchestrator. Every other kind is caught where it originates and
//! replaced by a documented default.

use thiserror::Error;

// ============================================================================
// DOMAIN ERROR TYPE
// ============================================================================

#[derive(Debug, Error)]
pub enum AuditError {
    /// Browser provisioning or navigation failed. Aborts the run.
    #[error("Crawl failed: {0}")]
    FatalCrawl(String),

    /// External call exceeded its hard deadline.
    #[error("External API timed out ({service}) after {elapsed_ms}ms")]
    ExternalApiTimeout {
        service: &'static str,
        elapsed_ms: u64,
    },

    /// External service returned an error or an unusable payload.
    #[error("Service error ({service}): {message}")]
    ExternalApi {
        service: &'static str,
        message: String,
    },

    /// Language-model reply was not the JSON we asked for.
    #[error("Malformed AI response: {0}")]
    MalformedAiResponse(String),

    /// Page markup was too ambiguous to extract a value.
    #[error("Partial data: {0}")]
    PartialData(String),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The caller cancelled the run.
    #[error("Audit cancelled")]
    Cancelled,
}

impl AuditError {
    pub fn crawl(msg: impl Into<String>) -> Self {
        Self::FatalCrawl(msg.into())
    }

    pub fn service(service: &'static str, msg: impl Into<String>) -> Self {
        Self::ExternalApi {
            service,
            message: msg.into(),
        }
    }

    pub fn timeout(service: &'static str, elapsed: std::time::Duration) -> Self {
        Self::ExternalApiTimeout {
            service,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Whether this error aborts an audit run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalCrawl(_) | Self::Cancelled)
    }
}

/// Result type alias using AuditError.
pub type Result<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn only_crawl_and_cancel_are_fatal() {
        assert!(AuditError::crawl("net::ERR_NAME_NOT_RESOLVED").is_fatal());
        assert!(AuditError::Cancelled.is_fatal());
        assert!(!AuditError::service("lab", "500").is_fatal());
        assert!(!AuditError::MalformedAiResponse("eof".into()).is_fatal());
        assert!(!AuditError::PartialData("no body".into()).is_fatal());
    }

    #[test]
    fn timeout_message_carries_elapsed() {
        let err = AuditError::timeout("lab", Duration::from_millis(12_000));
        assert_eq!(err.to_string(), "External API timed out (lab) after 12000ms");
    }
}
