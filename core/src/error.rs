//! Error types for the request dispatcher.
//!
//! # Design
//! Validation and transport failures surface as `DispatchError`. Response
//! decode failures never do: the normalizer downgrades them to an envelope
//! with no payload, so there is no variant for them here.

use thiserror::Error;

/// Errors returned by `RequestDispatcher` and the transport layer.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A caller-supplied argument was rejected before any I/O took place.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    /// The configured base URL is not an absolute URL.
    #[error("invalid base URL `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The relative URL could not be resolved against the base URL.
    #[error("invalid request URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The request body could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A declared part or body media type is not a valid MIME type.
    #[error("invalid content: {0}")]
    InvalidContent(String),

    /// A file stream could not be opened while building content.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote host could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The transport gave up waiting for the response.
    #[error("request timeout")]
    Timeout,

    /// Any other failure while sending or receiving.
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration could not be loaded or a client could not be built.
    #[error("configuration error: {0}")]
    Config(String),
}

impl DispatchError {
    /// True when the error happened on the wire rather than before sending.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DispatchError::Connection(_) | DispatchError::Timeout | DispatchError::Transport(_)
        )
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DispatchError::Timeout
        } else if err.is_connect() {
            DispatchError::Connection(err.to_string())
        } else if err.is_builder() {
            DispatchError::Config(err.to_string())
        } else {
            DispatchError::Transport(err.to_string())
        }
    }
}
