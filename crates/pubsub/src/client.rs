//! The pub/sub session and its protocol operations.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use namecast_transport::{
    Name, Request, RequestOptions, ServeHandler, SubmitError, Transport,
};
use tracing::debug;

use crate::command::Encoder;
use crate::error::{Error, Result};
use crate::params::{AdvertisementParams, PublishParams, Scope, StorageClass, SubscriptionParams};
use crate::response::{Envelope, LocalListing, Manifest};

/// A pub/sub session bound to one service prefix.
///
/// Cheap to clone; clones share the transport and see the same session
/// configuration. The prefix and default options are fixed at construction;
/// only the publisher prefix has a mutator, intended to be called before
/// the session is shared. In-flight operations are independent and may
/// resolve in any order.
#[derive(Debug)]
pub struct Pubsub<T> {
    transport: Arc<T>,
    encoder: Encoder,
    publisher_prefix: Name,
}

impl<T> Clone for Pubsub<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            encoder: self.encoder.clone(),
            publisher_prefix: self.publisher_prefix.clone(),
        }
    }
}

impl<T: Transport> Pubsub<T> {
    /// Create a session rooted at `prefix` with default request options.
    pub fn new(transport: T, prefix: Name) -> Self {
        Self::with_options(transport, prefix, RequestOptions::default())
    }

    /// Create a session with explicit default request options.
    pub fn with_options(transport: T, prefix: Name, options: RequestOptions) -> Self {
        Self {
            transport: Arc::new(transport),
            encoder: Encoder::new(prefix, options),
            publisher_prefix: Name::default(),
        }
    }

    /// The service prefix control commands are rooted at.
    #[must_use]
    pub const fn prefix(&self) -> &Name {
        self.encoder.prefix()
    }

    /// Set the publish-source prefix carried in publish metadata, so
    /// responders know where segments can be pulled from.
    pub fn set_publisher_prefix(&mut self, prefix: Name) {
        self.publisher_prefix = prefix;
    }

    /// Register a data stream under a topic.
    ///
    /// The record's data name is filled from `name` when the caller left it
    /// unset. Broker-class storage has an implicit location, so combining
    /// it with an explicit storage prefix fails before any request is sent.
    pub async fn advertise(&self, name: &Name, params: Option<AdvertisementParams>) -> Result<()> {
        let mut params = params.unwrap_or_default();
        if params.name.is_empty() {
            params.name = name.clone();
        }
        if params.storage == StorageClass::Broker && !params.storage_prefix.is_empty() {
            return Err(Error::Validation(format!(
                "Storagetype not PUBLISHER or DIFS given {}",
                params.storage_prefix
            )));
        }

        debug!(%name, "advertising");
        let request = self.encoder.advertise(name, Some(&params))?;
        let envelope = self.exchange(request).await?;
        if envelope.is_ok() {
            Ok(())
        } else {
            Err(Error::Application(
                envelope.reason_or("Unknown advertise error"),
            ))
        }
    }

    /// Remove a prior advertisement.
    ///
    /// With `allow_undefined` a responder refusal (typically reason
    /// `Undefined` for a name that was never advertised) still resolves
    /// `Ok`. Transport rejections, timeouts, and undecodable responses are
    /// never masked.
    pub async fn unadvertise(
        &self,
        name: &Name,
        params: Option<AdvertisementParams>,
        allow_undefined: bool,
    ) -> Result<()> {
        let mut params = params.unwrap_or_default();
        if params.name.is_empty() {
            params.name = name.clone();
        }

        debug!(%name, "unadvertising");
        let request = self.encoder.unadvertise(name, Some(&params))?;
        let envelope = self.exchange(request).await?;
        if envelope.is_ok() || allow_undefined {
            Ok(())
        } else {
            Err(Error::Application(
                envelope.reason_or("Unknown unadvertise error"),
            ))
        }
    }

    /// Serve one data segment on demand and announce it.
    ///
    /// Registers a serve route for `name` so the responder can pull the
    /// segment, then announces `name/seq`. Registration failure reports
    /// immediately and never issues the announcement. The route is
    /// withdrawn once the exchange resolves, on success and failure alike.
    pub async fn publish(&self, name: &Name, seq: u64, payload: Bytes) -> Result<()> {
        let segment = payload.clone();
        let handler: ServeHandler = Arc::new(move |requested: Name| {
            let segment = segment.clone();
            Box::pin(async move {
                debug!(%requested, "answering segment pull");
                Some(segment)
            })
        });
        let registration = self.transport.serve(name.clone(), handler).await?;

        debug!(%name, seq, "publishing");
        let outcome = self.announce(name, seq).await;
        if let Err(error) = registration.close().await {
            debug!(%name, "failed to withdraw publish route: {error}");
        }
        outcome
    }

    /// Enumerate advertised data names and their replicas under a topic.
    pub async fn list_topic(
        &self,
        topic: &Name,
        params: Option<SubscriptionParams>,
    ) -> Result<BTreeMap<Name, Vec<Name>>> {
        let params = params.unwrap_or_default();

        debug!(%topic, "listing topic");
        let request = self.encoder.list_topic(topic, Some(&params))?;
        let envelope = self.exchange(request).await?;
        if envelope.is_ok() {
            envelope.topic_listing()
        } else {
            Err(Error::Application(
                envelope.reason_or("Unknown list_topic error"),
            ))
        }
    }

    /// Ask one replica which sequence range it holds for `name`.
    pub async fn fetch_manifest(&self, name: &Name, replica: &Name) -> Result<Manifest> {
        debug!(%name, %replica, "fetching manifest");
        let request = self.encoder.fetch_manifest(name, replica)?;
        let envelope = self.exchange(request).await?;
        if !envelope.is_ok() {
            return Err(Error::Application(
                envelope.reason_or("Unknown fetch_manifest error"),
            ));
        }

        let (first, last) = envelope.sequence_range().ok_or_else(|| {
            Error::Decode(format!("manifest response for {name} carries no sequence range"))
        })?;
        Ok(Manifest {
            replica: replica.clone(),
            first,
            last,
        })
    }

    /// Enumerate data directly available at one local broker.
    ///
    /// Unlike every other operation, omitted params default to `Local`
    /// scope; explicitly supplied params are sent as-is.
    pub async fn list_local(
        &self,
        topic: &Name,
        params: Option<SubscriptionParams>,
    ) -> Result<LocalListing> {
        let params = params.unwrap_or_else(|| SubscriptionParams {
            scope: Scope::Local,
            ..SubscriptionParams::default()
        });

        debug!(%topic, "listing local broker");
        let request = self.encoder.list_local(topic, Some(&params))?;
        let envelope = self.exchange(request).await?;
        if envelope.is_ok() {
            envelope.local_listing()
        } else {
            Err(Error::Application(
                envelope.reason_or("Unknown list_local error"),
            ))
        }
    }

    /// Retrieve the segment `name/seq` from a specific replica.
    ///
    /// The response body is the raw segment payload; no envelope is
    /// involved. `lifetime` overrides the session default for this one
    /// request.
    pub async fn fetch_segment(
        &self,
        name: &Name,
        seq: u64,
        replica: &Name,
        lifetime: Option<Duration>,
    ) -> Result<Bytes> {
        debug!(%name, seq, %replica, "fetching segment");
        let request = self.encoder.fetch_segment(name, seq, replica, lifetime);
        self.submit(request).await
    }

    async fn announce(&self, name: &Name, seq: u64) -> Result<()> {
        let params = PublishParams {
            name: name.clone(),
            start_seq: seq,
            end_seq: seq,
            publisher_prefix: self.publisher_prefix.clone(),
        };
        let request = self.encoder.publish(name, seq, Some(&params))?;
        let envelope = self.exchange(request).await?;
        if !envelope.is_ok() {
            return Err(Error::Application(
                envelope.reason_or("Unknown publish error"),
            ));
        }

        // The value is the responder's stored-copy count; exactly one
        // stored copy is the only success.
        if envelope.value_as_int() == Some(1) {
            Ok(())
        } else {
            Err(Error::Application(
                envelope.reason_or("Unknown publish error"),
            ))
        }
    }

    async fn exchange(&self, request: Request) -> Result<Envelope> {
        let body = self.submit(request).await?;
        Envelope::parse(&body)
    }

    /// Submit one request, collapsing the transport's response, rejection,
    /// and timeout continuations into a single two-variant outcome.
    async fn submit(&self, request: Request) -> Result<Bytes> {
        match self.transport.submit(request).await {
            Ok(body) => Ok(body),
            Err(SubmitError::Rejected { name, reason }) => {
                debug!(%name, "request rejected ({reason})");
                Err(Error::Unreachable)
            }
            Err(SubmitError::TimedOut { name }) => {
                debug!(%name, "request timed out");
                Err(Error::Timeout)
            }
            Err(SubmitError::Transport(error)) => Err(Error::Transport(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use namecast_transport::{NackReason, Registration, TransportError};

    /// Transport that fails every submit the same way and refuses serves.
    #[derive(Debug)]
    struct FailingTransport(fn(Name) -> SubmitError);

    #[async_trait]
    impl Transport for FailingTransport {
        async fn submit(&self, request: Request) -> std::result::Result<Bytes, SubmitError> {
            Err((self.0)(request.name))
        }

        async fn serve(
            &self,
            prefix: Name,
            _handler: ServeHandler,
        ) -> std::result::Result<Box<dyn Registration>, TransportError> {
            Err(TransportError::RegisterFailed(prefix))
        }
    }

    /// Transport that panics if anything reaches it, proving an operation
    /// failed before submission.
    #[derive(Debug)]
    struct UnreachedTransport;

    #[async_trait]
    impl Transport for UnreachedTransport {
        async fn submit(&self, request: Request) -> std::result::Result<Bytes, SubmitError> {
            panic!("unexpected submit for {}", request.name);
        }

        async fn serve(
            &self,
            prefix: Name,
            _handler: ServeHandler,
        ) -> std::result::Result<Box<dyn Registration>, TransportError> {
            panic!("unexpected serve for {prefix}");
        }
    }

    #[tokio::test]
    async fn rejection_maps_to_unreachable() {
        let _ = tracing_subscriber::fmt::try_init();

        let pubsub = Pubsub::new(
            FailingTransport(|name| SubmitError::Rejected {
                name,
                reason: NackReason::Congestion,
            }),
            Name::new("/svc"),
        );

        let error = pubsub
            .advertise(&Name::new("/a/b"), None)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Unreachable));
        assert_eq!(error.to_string(), "Unreachable");
    }

    #[tokio::test]
    async fn timeout_maps_to_timeout() {
        let _ = tracing_subscriber::fmt::try_init();

        let pubsub = Pubsub::new(
            FailingTransport(|name| SubmitError::TimedOut { name }),
            Name::new("/svc"),
        );

        let error = pubsub
            .list_topic(&Name::new("/a"), None)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Timeout));
        assert_eq!(error.to_string(), "Timeout");
    }

    #[tokio::test]
    async fn contradictory_storage_fails_before_any_request() {
        let _ = tracing_subscriber::fmt::try_init();

        let pubsub = Pubsub::new(UnreachedTransport, Name::new("/svc"));
        let params = AdvertisementParams {
            storage: StorageClass::Broker,
            storage_prefix: Name::new("/store/a"),
            ..AdvertisementParams::default()
        };

        let error = pubsub
            .advertise(&Name::new("/a/b"), Some(params))
            .await
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Storagetype not PUBLISHER or DIFS given /store/a"
        );
        assert!(matches!(error, Error::Validation(_)));
    }

    #[tokio::test]
    async fn refused_registration_skips_the_announcement() {
        let _ = tracing_subscriber::fmt::try_init();

        let pubsub = Pubsub::new(
            FailingTransport(|name| SubmitError::TimedOut { name }),
            Name::new("/svc"),
        );

        // FailingTransport refuses every serve, so publish must fail with
        // the registration error without ever submitting.
        let error = pubsub
            .publish(&Name::new("/a/b"), 1, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "Couldn't register route /a/b");
    }
}
