//! # Error Types
//!
//! Error taxonomy for the DSM agent using `thiserror`.

use std::path::{Path, PathBuf};

/// Custom result type for DSM agent operations
pub type Result<T> = std::result::Result<T, DsmError>;

/// Main error type for the DSM agent
#[derive(thiserror::Error, Debug)]
pub enum DsmError {
    /// A required identity or credential field is missing or invalid.
    /// Raised before any network call and never retried.
    #[error("Configuration error: {message}")]
    Config { message: String, field: Option<String> },

    /// Network or TLS failure while talking to DSM
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// DSM reported a logical error; the message is passed through verbatim
    #[error("API error: {message}{}", .detail.as_ref().map(|d| format!(" ({})", d)).unwrap_or_default())]
    Api {
        message: String,
        detail: Option<String>,
        status: Option<i64>,
        error_code: Option<i64>,
    },

    /// The requested resource does not exist on DSM
    #[error("Resource not found: {resource_type} '{id}'")]
    NotFound { resource_type: String, id: String },

    /// Directory creation, removal or file write failure
    #[error("Filesystem error: {context} ({})", .path.display())]
    Filesystem {
        #[source]
        source: std::io::Error,
        context: String,
        path: PathBuf,
    },

    /// Response body could not be decoded
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },
}

impl DsmError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Create a configuration error tied to a specific field
    pub fn config_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    /// Create a transport error without an underlying HTTP error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport { message: message.into(), source: None }
    }

    /// Create a transport error wrapping a reqwest failure
    pub fn transport_with_source<S: Into<String>>(message: S, source: reqwest::Error) -> Self {
        Self::Transport { message: message.into(), source: Some(source) }
    }

    /// Create an API error carrying the server supplied message
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api { message: message.into(), detail: None, status: None, error_code: None }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Create a filesystem error for the given path
    pub fn filesystem<S: Into<String>>(
        source: std::io::Error,
        context: S,
        path: impl AsRef<Path>,
    ) -> Self {
        Self::Filesystem { source, context: context.into(), path: path.as_ref().to_path_buf() }
    }

    /// Create a serialization error with context
    pub fn serialization<S: Into<String>>(source: serde_json::Error, context: S) -> Self {
        Self::Serialization { source, context: context.into() }
    }

    /// Message reported by DSM, if this is an API error
    pub fn api_message(&self) -> Option<&str> {
        match self {
            DsmError::Api { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Check if this error should be retried by the refresh loop
    pub fn is_retryable(&self) -> bool {
        match self {
            DsmError::Transport { .. } => true,
            DsmError::Api { status: Some(status), .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for DsmError {
    fn from(error: reqwest::Error) -> Self {
        let message = if error.is_timeout() {
            "request to DSM timed out".to_string()
        } else if error.is_connect() {
            "could not connect to DSM".to_string()
        } else {
            "HTTP request to DSM failed".to_string()
        };
        Self::transport_with_source(message, error)
    }
}

impl From<validator::ValidationErrors> for DsmError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string()))
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::config(format!("Validation failed: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = DsmError::config("clientID cannot be empty");
        assert!(matches!(error, DsmError::Config { .. }));
        assert_eq!(error.to_string(), "Configuration error: clientID cannot be empty");
    }

    #[test]
    fn test_config_field_error() {
        let error = DsmError::config_field("must be defined", "SENHASEGURA_URL");
        if let DsmError::Config { field, .. } = error {
            assert_eq!(field, Some("SENHASEGURA_URL".to_string()));
        } else {
            panic!("expected config error");
        }
    }

    #[test]
    fn test_api_message_passthrough() {
        let error = DsmError::api("quota exceeded");
        assert_eq!(error.api_message(), Some("quota exceeded"));
        assert_eq!(error.to_string(), "API error: quota exceeded");
        assert_eq!(DsmError::config("x").api_message(), None);

        let error = DsmError::Api {
            message: "invalid_client".into(),
            detail: Some("Client authentication failed".into()),
            status: None,
            error_code: None,
        };
        assert_eq!(error.to_string(), "API error: invalid_client (Client authentication failed)");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(DsmError::transport("connection reset").is_retryable());
        assert!(DsmError::Api {
            message: "unavailable".into(),
            detail: None,
            status: Some(503),
            error_code: None
        }
        .is_retryable());
        assert!(!DsmError::api("quota exceeded").is_retryable());
        assert!(!DsmError::config("missing").is_retryable());
        assert!(!DsmError::not_found("application secrets", "app").is_retryable());
    }

    #[test]
    fn test_filesystem_error_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = DsmError::filesystem(io_error, "Failed to write secret file", "/tmp/x");
        assert_eq!(error.to_string(), "Filesystem error: Failed to write secret file (/tmp/x)");
    }

    #[test]
    fn test_validation_errors_become_config_errors() {
        let mut errors = validator::ValidationErrors::new();
        errors.add("request_timeout_secs", validator::ValidationError::new("range"));

        let error: DsmError = errors.into();
        assert!(matches!(error, DsmError::Config { .. }));
        assert_eq!(
            error.to_string(),
            "Configuration error: Validation failed: request_timeout_secs: Invalid value"
        );
    }
}
