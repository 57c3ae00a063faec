//! In-memory transport implementation for testing and demos.
//!
//! [`MemoryNetwork`] is a process-local network fabric: serve registrations
//! become name-prefix routes, submitted requests are matched against routes
//! (longest prefix wins) and a content store, and the three request outcomes
//! are reproduced faithfully — a handler answer, a `NoRoute` negative
//! acknowledgment when nothing can answer, or a timeout once the request
//! lifetime elapses.
//!
//! Cached entries never satisfy a must-be-fresh request; a request with
//! `can_be_prefix` set may be answered by a cached entry whose name extends
//! the requested one. Forwarding hints are recorded but do not influence
//! routing: the fabric is a single zone, so name-based matching already
//! reaches every registered responder. Every submitted request is kept in a
//! log for test assertions.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use namecast_transport::{
    NackReason, Name, Registration, Request, ServeHandler, SubmitError, Transport, TransportError,
};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Process-local network fabric.
///
/// Cheap to clone; clones share routes, the content store, and the request
/// log, so one fabric can back several sessions in a test or demo.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    routes: DashMap<Name, ServeHandler>,
    store: DashMap<Name, Bytes>,
    submitted: Mutex<Vec<Request>>,
}

impl MemoryNetwork {
    /// Create an empty fabric.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the content store with a segment, as if a responder had already
    /// answered for `name`.
    pub fn store_segment(&self, name: Name, payload: Bytes) {
        self.inner.store.insert(name, payload);
    }

    /// Whether a serve route is currently registered for exactly `prefix`.
    #[must_use]
    pub fn has_route(&self, prefix: &Name) -> bool {
        self.inner.routes.contains_key(prefix)
    }

    /// Snapshot of every request submitted so far, in submission order.
    #[must_use]
    pub fn submitted(&self) -> Vec<Request> {
        self.inner.submitted.lock().clone()
    }

    /// The handler of the most specific route matching `name`, if any.
    fn route_for(&self, name: &Name) -> Option<ServeHandler> {
        let mut best: Option<(usize, ServeHandler)> = None;
        for entry in &self.inner.routes {
            if name.starts_with(entry.key()) {
                let specificity = entry.key().as_str().len();
                if best.as_ref().is_none_or(|(len, _)| specificity > *len) {
                    best = Some((specificity, entry.value().clone()));
                }
            }
        }
        best.map(|(_, handler)| handler)
    }

    fn lookup_cached(&self, name: &Name, can_be_prefix: bool) -> Option<Bytes> {
        if let Some(hit) = self.inner.store.get(name) {
            return Some(hit.clone());
        }
        if can_be_prefix {
            for entry in &self.inner.store {
                if entry.key().starts_with(name) {
                    return Some(entry.value().clone());
                }
            }
        }
        None
    }
}

impl Debug for MemoryNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryNetwork")
            .field("routes", &self.inner.routes.len())
            .field("store", &self.inner.store.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for MemoryNetwork {
    async fn submit(&self, request: Request) -> Result<Bytes, SubmitError> {
        debug!("submitting request for {}", request.name);
        self.inner.submitted.lock().push(request.clone());

        // Content store first, but never for must-be-fresh requests.
        if !request.options.must_be_fresh {
            if let Some(cached) = self.lookup_cached(&request.name, request.options.can_be_prefix)
            {
                debug!("content store hit for {}", request.name);
                return Ok(cached);
            }
        }

        let Some(handler) = self.route_for(&request.name) else {
            debug!("no route for {}", request.name);
            return Err(SubmitError::Rejected {
                name: request.name,
                reason: NackReason::NoRoute,
            });
        };

        let started = Instant::now();
        match tokio::time::timeout(request.options.lifetime, handler(request.name.clone())).await {
            Ok(Some(payload)) => {
                debug!(
                    "route answered {} with {} bytes",
                    request.name,
                    payload.len()
                );
                self.inner.store.insert(request.name.clone(), payload.clone());
                Ok(payload)
            }
            Ok(None) => {
                // The route declined and nothing else can answer; wait out
                // the remaining lifetime before reporting the timeout.
                let remaining = request.options.lifetime.saturating_sub(started.elapsed());
                tokio::time::sleep(remaining).await;
                Err(SubmitError::TimedOut { name: request.name })
            }
            Err(_) => Err(SubmitError::TimedOut { name: request.name }),
        }
    }

    async fn serve(
        &self,
        prefix: Name,
        handler: ServeHandler,
    ) -> Result<Box<dyn Registration>, TransportError> {
        match self.inner.routes.entry(prefix.clone()) {
            Entry::Occupied(_) => Err(TransportError::RegisterFailed(prefix)),
            Entry::Vacant(slot) => {
                slot.insert(handler);
                info!("serving {prefix}");
                Ok(Box::new(MemoryRegistration {
                    prefix,
                    network: self.clone(),
                }))
            }
        }
    }
}

/// Route handle returned by [`MemoryNetwork::serve`].
#[derive(Debug)]
struct MemoryRegistration {
    prefix: Name,
    network: MemoryNetwork,
}

#[async_trait]
impl Registration for MemoryRegistration {
    fn prefix(&self) -> &Name {
        &self.prefix
    }

    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        debug!("withdrawing route {}", self.prefix);
        self.network.inner.routes.remove(&self.prefix);
        Ok(())
    }
}
