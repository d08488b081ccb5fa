//! Error types for the harness.
//!
//! # Design
//! `ApiError` is the single channel through which a failed API call reaches
//! test code. Each variant carries the method and endpoint so the message
//! alone is enough to diagnose a failure. `Api` keeps the raw status and body
//! because "the server said no" is the expected outcome of many negative
//! tests; callers match on it instead of parsing strings.
//!
//! `ObservabilityError` never escapes the sink. It exists so the failure can
//! be logged with a cause rather than swallowed silently.

use crate::http::HttpMethod;

/// Failure of one API operation.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server answered with a non-2xx status.
    #[error("{method} {endpoint} failed with HTTP {status}: {body}")]
    Api {
        method: HttpMethod,
        endpoint: String,
        status: u16,
        body: String,
    },

    /// No response was obtained (connection refused, timeout, bad URL).
    #[error("{method} {endpoint} failed before a response was received: {message}")]
    Transport {
        method: HttpMethod,
        endpoint: String,
        message: String,
    },

    /// The response body does not match the expected entity shape.
    #[error("{method} {endpoint} returned HTTP {status} with an undecodable body ({message}): {body}")]
    Decode {
        method: HttpMethod,
        endpoint: String,
        status: u16,
        body: String,
        message: String,
    },

    /// The request payload could not be serialized.
    #[error("{method} {endpoint}: request payload could not be encoded: {message}")]
    Encode {
        method: HttpMethod,
        endpoint: String,
        message: String,
    },

    /// The caller broke a precondition; no request was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ApiError {
    /// HTTP status carried by the failure, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } | ApiError::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Api { status: 404, .. })
    }
}

/// Entity wire-format failure, before method/endpoint context is attached.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("response body is empty")]
    EmptyBody,

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The transport could not produce a response.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// A required configuration value is absent or the source is unreadable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration value `{key}` is not set")]
    Missing { key: String },

    #[error("configuration value `{key}` is invalid: {message}")]
    Invalid { key: String, message: String },

    #[error("could not read configuration from {path}: {message}")]
    Unreadable { path: String, message: String },
}

/// Logging or attachment machinery failed. Always caught where it occurs.
#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    #[error("attachment `{label}` could not be stored: {message}")]
    Attachment { label: String, message: String },

    #[error("log file {path} could not be written: {message}")]
    LogFile { path: String, message: String },

    #[error("payload for `{label}` could not be rendered: {message}")]
    Render { label: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_message_names_method_endpoint_and_body() {
        let err = ApiError::Api {
            method: HttpMethod::Get,
            endpoint: "http://localhost:3000/api/abilities/x".to_string(),
            status: 404,
            body: r#"{"message":"Ability not found"}"#.to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("GET"));
        assert!(msg.contains("/api/abilities/x"));
        assert!(msg.contains("404"));
        assert!(msg.contains("Ability not found"));
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn transport_error_has_no_status() {
        let err = ApiError::Transport {
            method: HttpMethod::Post,
            endpoint: "http://127.0.0.1:1/api/cases".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(err.status(), None);
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("POST http://127.0.0.1:1/api/cases"));
    }
}
