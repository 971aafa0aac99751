//! Service-specific error types

use thiserror::Error;

/// Errors from calls made through a built `ServiceClient`.
///
/// Failures while *building* the client are `credential_broker::Failure`
/// values and never show up here.
#[derive(Error, Debug)]
pub enum Error {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("invalid JSON from {url}: {message}")]
    Decode { url: String, message: String },
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
