//! Error types for the PVR client

use thiserror::Error;

/// Result type alias for PVR client operations
pub type Result<T> = std::result::Result<T, PvrError>;

/// Status code handed back to the host for a failed or successful callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    NoError,
    ServerError,
    NotImplemented,
}

/// Errors that can occur while talking to the backend or answering the host
#[derive(Debug, Error)]
pub enum PvrError {
    /// The GET request itself failed (connection refused, timeout, ...)
    #[error("Network error: {0}")]
    Transport(String),

    /// The backend answered with an empty body
    #[error("Empty response from {0}")]
    EmptyResponse(String),

    /// The body was not valid JSON
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed document without a field we require
    #[error("Missing or invalid field '{field}' in {context} response")]
    MissingField {
        field: &'static str,
        context: &'static str,
    },

    /// Well-formed document carrying an explicit `error` field
    #[error("Backend error: {0}")]
    Backend(String),

    /// Connectivity gate exhausted its retry budget
    #[error("Backend unavailable for {0}")]
    BackendUnavailable(String),

    /// No channel with this display number in the catalog
    #[error("Channel not found: {0}")]
    ChannelNotFound(i32),

    /// A bulk load finished with nothing in the catalog
    #[error("No {0} loaded")]
    EmptyCatalog(&'static str),

    /// The request does not apply yet (catch-up window violations)
    #[error("Not eligible: {0}")]
    NotEligible(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PvrError {
    /// Build a missing-field error
    pub fn missing(field: &'static str, context: &'static str) -> Self {
        Self::MissingField { field, context }
    }

    /// Status to report to the host. Only catch-up window violations map to
    /// "not implemented"; everything else is a server error.
    pub fn status(&self) -> HostStatus {
        match self {
            PvrError::NotEligible(_) => HostStatus::NotImplemented,
            _ => HostStatus::ServerError,
        }
    }
}

impl From<ureq::Error> for PvrError {
    fn from(err: ureq::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            PvrError::NotEligible("future".into()).status(),
            HostStatus::NotImplemented
        );
        assert_eq!(PvrError::ChannelNotFound(7).status(), HostStatus::ServerError);
        assert_eq!(
            PvrError::Backend("boom".into()).status(),
            HostStatus::ServerError
        );
        assert_eq!(
            PvrError::BackendUnavailable("stream playback".into()).status(),
            HostStatus::ServerError
        );
    }

    #[test]
    fn test_error_display() {
        let err = PvrError::missing("providers", "providers");
        assert_eq!(
            err.to_string(),
            "Missing or invalid field 'providers' in providers response"
        );
        assert_eq!(PvrError::ChannelNotFound(42).to_string(), "Channel not found: 42");
    }

    #[test]
    fn test_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: PvrError = json_err.into();
        assert!(matches!(err, PvrError::Json(_)));
    }
}
