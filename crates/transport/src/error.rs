//! Transport error taxonomy.

use std::fmt;

use thiserror::Error;

use crate::Name;

/// Errors raised by transport implementations outside the request/response
/// path.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A serve route could not be registered.
    #[error("Couldn't register route {0}")]
    RegisterFailed(Name),

    /// The transport has been shut down.
    #[error("transport closed")]
    Closed,

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

/// Reason carried by a negative acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackReason {
    /// No route toward the requested name.
    NoRoute,
    /// The network is shedding load.
    Congestion,
    /// A duplicate nonce was seen in flight.
    Duplicate,
}

impl fmt::Display for NackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRoute => f.write_str("no route"),
            Self::Congestion => f.write_str("congestion"),
            Self::Duplicate => f.write_str("duplicate"),
        }
    }
}

/// The failure legs of a submitted request.
///
/// Every submitted request resolves exactly once: a correlated response body,
/// a negative acknowledgment, or a timeout. The latter two are reported here.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The network rejected the request with a negative acknowledgment.
    #[error("request for {name} rejected: {reason}")]
    Rejected {
        /// The request name.
        name: Name,
        /// Why the network refused it.
        reason: NackReason,
    },

    /// No response arrived within the request lifetime.
    #[error("request for {name} timed out")]
    TimedOut {
        /// The request name.
        name: Name,
    },

    /// The transport itself failed before an outcome was reached.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
