//! Error taxonomy for REST operations.

use thiserror::Error;

use super::transport::{Method, TransportError};

/// Errors raised by REST operations against a service API.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RestError {
    /// Raised when a response status falls outside the expected set.
    #[error("{method} {path} returned {status}, expected one of {expected:?}: {body}")]
    UnexpectedStatus {
        /// HTTP method of the failed request.
        method: Method,
        /// Request path relative to the service endpoint.
        path: String,
        /// Status received from the service.
        status: u16,
        /// Statuses the caller accepted.
        expected: Vec<u16>,
        /// Response body, kept for diagnostics.
        body: String,
    },
    /// Raised when the service reports 404 for the requested resource.
    #[error("{method} {path}: resource not found")]
    NotFound {
        /// HTTP method of the failed request.
        method: Method,
        /// Request path relative to the service endpoint.
        path: String,
    },
    /// Raised when a payload cannot be encoded or decoded as JSON.
    #[error("payload error for {path}: {message}")]
    Payload {
        /// Request path relative to the service endpoint.
        path: String,
        /// Description of the JSON failure.
        message: String,
    },
    /// Raised when an operation needs a newer API version than configured.
    #[error("{operation} requires volume API v{required}, but v{selected} is selected")]
    UnsupportedApiVersion {
        /// Operation that was attempted.
        operation: String,
        /// Minimum API major version required.
        required: String,
        /// Version selected by configuration.
        selected: String,
    },
    /// Raised when the request never produced an HTTP status.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RestError {
    /// True when the error reports a 404 for the requested resource.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
