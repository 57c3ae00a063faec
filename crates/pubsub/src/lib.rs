//! Client-side protocol engine for name-addressed publish/subscribe.
//!
//! The engine speaks a command/response protocol over any
//! [`Transport`](namecast_transport::Transport): application commands
//! become tagged request names carrying one-key JSON parameter envelopes,
//! and responses come back as status envelopes that resolve each operation
//! to exactly one outcome.
//!
//! - [`command::Encoder`] turns operations into transport requests (pure,
//!   no I/O);
//! - [`params`] holds the typed parameter records and their JSON codec;
//! - [`Pubsub`] is the session object exposing the protocol operations;
//! - [`Subscriber`] fans "subscribe to a topic" out into listing, manifest
//!   discovery, and segment fetches.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod client;
pub mod command;
mod error;
pub mod params;
mod response;
mod subscriber;

pub use client::Pubsub;
pub use error::{Error, Result};
pub use params::{AdvertisementParams, PublishParams, Scope, StorageClass, SubscriptionParams};
pub use response::{LocalListing, LocalManifest, Manifest};
pub use subscriber::{Segment, Subscriber, SubscriptionEvent};
