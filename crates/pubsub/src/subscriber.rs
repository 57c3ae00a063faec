//! Multi-stage subscription orchestration.
//!
//! Subscribing is a fan-out pipeline: list the topic, then per listed name
//! discover the available sequence range at one replica, then fetch the
//! newest segment. Each name runs as an independent branch; one branch
//! failing never cancels its siblings.

use bytes::Bytes;
use namecast_transport::{Name, Transport};
use tokio::sync::mpsc;
use tracing::debug;

use crate::client::Pubsub;
use crate::error::{Error, Result};
use crate::params::SubscriptionParams;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// One fetched data segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// The data name the segment belongs to.
    pub name: Name,
    /// The segment's sequence number.
    pub seq: u64,
    /// The replica it was fetched from.
    pub replica: Name,
    /// The payload bytes.
    pub payload: Bytes,
}

/// Terminal outcome of one subscription branch.
#[derive(Debug)]
pub enum SubscriptionEvent {
    /// The branch fetched its name's newest segment.
    Segment(Segment),
    /// The branch failed at some stage; sibling branches are unaffected.
    Failed {
        /// The data name whose branch failed.
        name: Name,
        /// The stage failure.
        error: Error,
    },
}

/// Drives topic listing, manifest discovery, and segment fetches.
#[derive(Debug)]
pub struct Subscriber<T> {
    pubsub: Pubsub<T>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            pubsub: self.pubsub.clone(),
        }
    }
}

impl<T: Transport> Subscriber<T> {
    /// Wrap a session.
    pub const fn new(pubsub: Pubsub<T>) -> Self {
        Self { pubsub }
    }

    /// Subscribe to a topic: fetch the newest segment of every name
    /// advertised under it.
    ///
    /// A listing failure is returned directly. Each listed name then runs
    /// one branch that asks the name's *last* listed replica for its
    /// manifest and fetches the segment at the manifest's last sequence
    /// number. Every branch reports exactly one event; the channel closes
    /// once all branches have reported.
    pub async fn subscribe(
        &self,
        topic: &Name,
        params: Option<SubscriptionParams>,
    ) -> Result<mpsc::Receiver<SubscriptionEvent>> {
        let listing = self.pubsub.list_topic(topic, params).await?;
        debug!(%topic, names = listing.len(), "topic listed");

        let (events, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        for (name, replicas) in listing {
            let events = events.clone();
            // Only the most recently listed replica is consulted.
            let Some(replica) = replicas.last().cloned() else {
                tokio::spawn(async move {
                    let error = Error::Decode(format!("no replica listed for {name}"));
                    let _ = events.send(SubscriptionEvent::Failed { name, error }).await;
                });
                continue;
            };

            let pubsub = self.pubsub.clone();
            tokio::spawn(async move {
                let event = match fetch_newest(&pubsub, &name, &replica).await {
                    Ok(segment) => SubscriptionEvent::Segment(segment),
                    Err(error) => SubscriptionEvent::Failed { name, error },
                };
                let _ = events.send(event).await;
            });
        }
        Ok(receiver)
    }

    /// Subscribe through one local broker, skipping manifest discovery.
    ///
    /// The local listing already carries concrete sequence ranges, so each
    /// branch fetches its name's last segment directly from the broker
    /// that answered.
    pub async fn subscribe_local(
        &self,
        topic: &Name,
        params: Option<SubscriptionParams>,
    ) -> Result<mpsc::Receiver<SubscriptionEvent>> {
        let listing = self.pubsub.list_local(topic, params).await?;
        debug!(
            %topic,
            broker = %listing.broker,
            names = listing.manifests.len(),
            "local broker listed"
        );

        let (events, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        for manifest in listing.manifests {
            let broker = listing.broker.clone();
            let pubsub = self.pubsub.clone();
            let events = events.clone();
            tokio::spawn(async move {
                let event = match pubsub
                    .fetch_segment(&manifest.name, manifest.last, &broker, None)
                    .await
                {
                    Ok(payload) => SubscriptionEvent::Segment(Segment {
                        name: manifest.name,
                        seq: manifest.last,
                        replica: broker,
                        payload,
                    }),
                    Err(error) => SubscriptionEvent::Failed {
                        name: manifest.name,
                        error,
                    },
                };
                let _ = events.send(event).await;
            });
        }
        Ok(receiver)
    }
}

/// One subscription branch: manifest discovery, then the newest segment.
async fn fetch_newest<T: Transport>(
    pubsub: &Pubsub<T>,
    name: &Name,
    replica: &Name,
) -> Result<Segment> {
    let manifest = pubsub.fetch_manifest(name, replica).await?;
    let payload = pubsub
        .fetch_segment(name, manifest.last, &manifest.replica, None)
        .await?;
    Ok(Segment {
        name: name.clone(),
        seq: manifest.last,
        replica: manifest.replica,
        payload,
    })
}
