//! Error taxonomy shared by all pub/sub operations.

use namecast_transport::TransportError;
use thiserror::Error;

/// Result alias for pub/sub operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single pub/sub operation.
///
/// Every operation resolves to exactly one outcome, and every failure
/// carries a human-readable reason through `Display`. Nothing is retried
/// internally; re-invoking an operation builds an entirely new request
/// with a fresh nonce and lifetime window.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed caller input, rejected before any request is sent.
    #[error("{0}")]
    Validation(String),

    /// A response or parameter document could not be decoded.
    #[error("{0}")]
    Decode(String),

    /// The transport rejected the request outright.
    #[error("Unreachable")]
    Unreachable,

    /// No response arrived within the request lifetime.
    #[error("Timeout")]
    Timeout,

    /// The responder explicitly answered with a non-OK status.
    #[error("{0}")]
    Application(String),

    /// A transport failure outside the request/response path, such as a
    /// refused route registration.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
