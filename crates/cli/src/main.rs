//! CLI binary walking a publish/subscribe round over an in-memory fabric.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod broker;

use bytes::Bytes;
use clap::Parser;
use namecast_pubsub::{Pubsub, Subscriber, SubscriptionEvent};
use namecast_transport::Name;
use namecast_transport_memory::MemoryNetwork;
use tracing::{info, warn};

use crate::broker::Broker;

/// CLI-specific error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Pub/sub operation failure
    #[error(transparent)]
    Pubsub(#[from] namecast_pubsub::Error),

    /// Transport failure
    #[error(transparent)]
    Transport(#[from] namecast_transport::TransportError),
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Service prefix the broker answers on
    #[arg(long, default_value = "/demo/broker", env = "NAMECAST_PREFIX")]
    prefix: String,

    /// Topic the demo publishes and subscribes under
    #[arg(long, default_value = "/city/weather", env = "NAMECAST_TOPIC")]
    topic: String,

    /// Number of segments to publish per stream
    #[arg(long, default_value_t = 3, env = "NAMECAST_SEGMENTS")]
    segments: u64,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let service = Name::new(args.prefix.as_str());
    let network = MemoryNetwork::new();
    let broker = Broker::start(network.clone(), service.clone()).await?;

    let topic = Name::new(args.topic.as_str());
    let streams = [topic.child("temperature"), topic.child("humidity")];

    let mut publisher = Pubsub::new(network.clone(), service.clone());
    publisher.set_publisher_prefix(Name::new("/demo/publisher"));

    for name in &streams {
        publisher.advertise(name, None).await?;
        info!(%name, "advertised");
    }

    // Re-advertising without the redefine flag is refused by the broker.
    if let Err(error) = publisher.advertise(&streams[0], None).await {
        info!(name = %streams[0], "re-advertise refused: {error}");
    }

    for name in &streams {
        for seq in 1..=args.segments {
            let payload = Bytes::from(format!("{name} #{seq}"));
            publisher.publish(name, seq, payload).await?;
        }
        info!(%name, segments = args.segments, "published");
    }

    let listing = publisher.list_topic(&topic, None).await?;
    for (name, replicas) in &listing {
        info!(%name, ?replicas, "listed under topic");
    }

    let subscriber = Subscriber::new(Pubsub::new(network.clone(), service));
    info!(%topic, "subscribing");
    consume(subscriber.subscribe(&topic, None).await?).await;

    let local = publisher.list_local(&topic, None).await?;
    info!(broker = %local.broker, names = local.manifests.len(), "local listing");
    info!(%topic, "subscribing via the local broker");
    consume(subscriber.subscribe_local(&topic, None).await?).await;

    for name in &streams {
        publisher.unadvertise(name, None, false).await?;
        info!(%name, "unadvertised");
    }

    broker.shutdown().await?;
    info!("demo complete");
    Ok(())
}

/// Drain one subscription's events, logging each branch outcome.
async fn consume(mut events: tokio::sync::mpsc::Receiver<SubscriptionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SubscriptionEvent::Segment(segment) => {
                info!(
                    name = %segment.name,
                    seq = segment.seq,
                    payload = %String::from_utf8_lossy(&segment.payload),
                    "received segment"
                );
            }
            SubscriptionEvent::Failed { name, error } => {
                warn!(%name, "subscription branch failed: {error}");
            }
        }
    }
}
