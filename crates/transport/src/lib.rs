//! Name-addressed request/response transport abstraction.
//!
//! Every request is addressed by a hierarchical [`Name`], carries optional
//! parameter bytes and per-request [`RequestOptions`], and resolves exactly
//! once: a correlated response body, a negative acknowledgment, or a timeout
//! after the request lifetime elapses. Concrete transports live in sibling
//! crates; this crate holds the vocabulary types and the [`Transport`] trait.
//!
//! Transports own the security envelope: they sign whatever bytes a serve
//! handler yields and verify responses before handing them back, so callers
//! only ever see verified payloads.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod name;
mod request;

pub use error::{NackReason, SubmitError, TransportError};
pub use name::Name;
pub use request::{Delegation, Request, RequestOptions};

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;

/// Handler invoked for every request arriving under a served prefix.
///
/// The handler receives the full requested name and yields the bytes to sign
/// and send back, or `None` to leave the request unanswered (it then times
/// out at the requester).
pub type ServeHandler = Arc<dyn Fn(Name) -> BoxFuture<'static, Option<Bytes>> + Send + Sync>;

/// A live serve registration.
///
/// Withdrawal is explicit: dropping the registration without calling
/// [`close`](Self::close) leaves the route in place.
#[async_trait]
pub trait Registration: Debug + Send + Sync {
    /// The name prefix this registration answers for.
    fn prefix(&self) -> &Name;

    /// Withdraw the route.
    async fn close(self: Box<Self>) -> Result<(), TransportError>;
}

/// A name-addressed request/response transport.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send one request and wait for its single outcome.
    async fn submit(&self, request: Request) -> Result<Bytes, SubmitError>;

    /// Express willingness to answer requests under `prefix`.
    ///
    /// The transport calls `handler` with each requested name and
    /// signs-and-sends whatever bytes it yields.
    async fn serve(
        &self,
        prefix: Name,
        handler: ServeHandler,
    ) -> Result<Box<dyn Registration>, TransportError>;
}
