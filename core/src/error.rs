//! Error types for the gateway toolkit.
//!
//! # Design
//! One crate-wide `Error` covers the request lifecycle, model mapping,
//! registry and storage failures so gateway integrations can propagate with
//! `?` across all of them. Transport failures get their own `TransportError`
//! and are wrapped unchanged, keeping the source chain intact.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by gateways, requests, models, the registry and storage.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// `validate()` rejected the request data; the transport was not called.
    #[error("request {request} is not valid: {reason}")]
    InvalidRequest {
        request: &'static str,
        reason: String,
    },

    /// Request data was changed after a response had been captured.
    #[error("request cannot be modified after it has been sent")]
    RequestAlreadySent,

    /// `get_response()` was called before a successful `send()`.
    #[error("you must call send() before accessing the response")]
    ResponseNotAvailable,

    /// The server answered with data the endpoint refuses to accept.
    #[error("invalid response from server: {0}")]
    InvalidResponse(String),

    /// No constructor is registered under the resolved gateway name.
    #[error("gateway '{0}' not found")]
    GatewayNotFound(String),

    /// Configuration or package metadata is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A model field holds a value with no flat representation.
    #[error("cannot convert field '{field}' of model {model} to a flat value")]
    UnsupportedConversion {
        model: &'static str,
        field: &'static str,
    },

    /// A raw value does not fit the declared type of a model field.
    #[error("invalid value for field '{field}' of model {model}: {reason}")]
    InvalidField {
        model: &'static str,
        field: &'static str,
        reason: String,
    },

    /// File storage root collides with an existing non-directory path.
    #[error("invalid storage location {0}: a file with the same name already exists")]
    StorageLocationConflict(PathBuf),

    /// The key cannot be used as a storage file name.
    #[error("invalid storage key '{0}'")]
    InvalidStorageKey(String),

    /// JSON or decimal text could not be parsed.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures raised by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The URL assembled from the request attributes is unusable.
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    /// Network or protocol failure while executing the call.
    #[error("transport error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(#[source] Box<dyn std::error::Error + Send + Sync>),
}
