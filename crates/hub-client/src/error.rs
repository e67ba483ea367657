//! Error types for hub publish operations.
//!
//! Separates caller mistakes (missing configuration, unserializable content)
//! from delivery failures that are expected to be transient. Delivery errors
//! carry enough context (status code, response body) for the failure log and
//! for the caller's own handling once the retry budget is spent.

use std::fmt;

use thiserror::Error;

/// Result type alias for publish operations.
pub type Result<T> = std::result::Result<T, PublishError>;

/// Errors returned by [`Publisher`](crate::Publisher) and [`Transport`](crate::Transport)
/// implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Required configuration is missing. Raised before any network activity.
    #[error("configuration error: {message}")]
    ConfigurationError {
        /// What is missing or unusable
        message: String,
    },

    /// Connect or read timeout exceeded.
    #[error("request timeout: {message}")]
    Timeout {
        /// Transport-supplied description of the timeout
        message: String,
    },

    /// Connection refused, reset, DNS failure and similar.
    #[error("network connection failed: {message}")]
    NetworkError {
        /// Transport-supplied description of the failure
        message: String,
    },

    /// The hub answered with a status outside the 2xx class.
    #[error("hub responded with HTTP {status_code}")]
    HttpStatus {
        /// HTTP status code
        status_code: u16,
        /// Response body content
        body: String,
    },

    /// The transport could not build or send the request at all.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Why the request was rejected
        message: String,
    },

    /// Message content could not be encoded as JSON.
    #[error("failed to serialize message: {message}")]
    Serialization {
        /// Encoder error message
        message: String,
    },

    /// The caller cancelled the publish.
    #[error("publish cancelled")]
    Cancelled,
}

impl PublishError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout { message: message.into() }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError { message: message.into() }
    }

    /// Creates an error for a non-2xx hub response.
    pub fn http_status(status_code: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus { status_code, body: body.into() }
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest { message: message.into() }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into() }
    }

    /// Returns `true` for failures worth retrying: timeouts, connection
    /// failures and every non-2xx response.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::NetworkError { .. } | Self::HttpStatus { .. } => true,

            Self::ConfigurationError { .. }
            | Self::InvalidRequest { .. }
            | Self::Serialization { .. }
            | Self::Cancelled => false,
        }
    }

    /// HTTP status code, if the hub answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Response body, if the hub answered at all.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::HttpStatus { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PublishError {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization(error.to_string())
    }
}

/// Coarse classification of a [`PublishError`] used in failure logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or unusable configuration.
    Configuration,
    /// Connect/read timeouts.
    Timeout,
    /// Connection-level failures.
    Network,
    /// Non-2xx hub responses.
    Http,
    /// Requests the transport refused to build.
    Request,
    /// Content encoding failures.
    Serialization,
    /// Caller-initiated aborts.
    Cancelled,
}

impl From<&PublishError> for ErrorCategory {
    fn from(error: &PublishError) -> Self {
        match error {
            PublishError::ConfigurationError { .. } => Self::Configuration,
            PublishError::Timeout { .. } => Self::Timeout,
            PublishError::NetworkError { .. } => Self::Network,
            PublishError::HttpStatus { .. } => Self::Http,
            PublishError::InvalidRequest { .. } => Self::Request,
            PublishError::Serialization { .. } => Self::Serialization,
            PublishError::Cancelled => Self::Cancelled,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Timeout => write!(f, "timeout"),
            Self::Network => write!(f, "network"),
            Self::Http => write!(f, "http"),
            Self::Request => write!(f, "request"),
            Self::Serialization => write!(f, "serialization"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
