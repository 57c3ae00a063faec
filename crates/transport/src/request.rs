//! Outbound request construction.

use std::time::Duration;

use bytes::Bytes;

use crate::Name;

/// Per-request transport knobs. Immutable once a request is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// Whether the responder's name may extend the requested name.
    pub can_be_prefix: bool,
    /// Reject cached responses; require a live answer.
    pub must_be_fresh: bool,
    /// How long the transport waits before reporting a timeout.
    pub lifetime: Duration,
    /// Correlation token. When unset, one is stamped per built request.
    pub nonce: Option<u32>,
    /// Relay-count bound.
    pub hop_limit: Option<u8>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            can_be_prefix: false,
            must_be_fresh: true,
            // Must exceed the transport's 4000ms retransmission floor.
            lifetime: Duration::from_millis(10_000),
            nonce: None,
            hop_limit: None,
        }
    }
}

/// Forwarding hint steering a request toward a specific node regardless of
/// ordinary name-based routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    /// Lower preference values are tried first.
    pub preference: u32,
    /// The namespace to forward toward.
    pub name: Name,
}

impl Delegation {
    /// Create a forwarding hint.
    pub const fn new(preference: u32, name: Name) -> Self {
        Self { preference, name }
    }
}

/// One outbound named request.
#[derive(Debug, Clone)]
pub struct Request {
    /// The request name.
    pub name: Name,
    /// Serialized parameter document, if the command carries one.
    pub payload: Option<Bytes>,
    /// Transport options for this request.
    pub options: RequestOptions,
    /// Forwarding hints, in preference order.
    pub hints: Vec<Delegation>,
}

impl Request {
    /// Create a request with default options, no payload, and no hints.
    pub fn new(name: Name) -> Self {
        Self {
            name,
            payload: None,
            options: RequestOptions::default(),
            hints: Vec::new(),
        }
    }

    /// Attach a parameter payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Bytes) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Replace the request options.
    #[must_use]
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Append a forwarding hint.
    #[must_use]
    pub fn with_hint(mut self, hint: Delegation) -> Self {
        self.hints.push(hint);
        self
    }
}
