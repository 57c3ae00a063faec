//! Command encoding: application operations into transport requests.
//!
//! Control commands are addressed as `<prefix>/<TAG>/<target>[/<seq>]` with
//! a one-key JSON parameter envelope as payload. Segment fetches are plain
//! `<target>/<seq>` names with no payload. The encoder is pure; it performs
//! no I/O and never fails for well-formed inputs.

use std::time::Duration;

use bytes::Bytes;
use namecast_transport::{Delegation, Name, Request, RequestOptions};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::params::{self, AdvertisementParams, PublishParams, SubscriptionParams};

/// The application-level commands this engine issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Register a data stream under a topic (`PA`).
    Advertise,
    /// Remove a prior advertisement (`PU`).
    Unadvertise,
    /// Announce one publishable segment (`PD`).
    Publish,
    /// Enumerate advertised names under a topic (`ST`).
    ListTopic,
    /// Ask one replica for a name's sequence range (`SM`).
    FetchManifest,
    /// Enumerate names available at the local broker (`SL`).
    ListLocal,
    /// Retrieve one data segment; untagged, plain `name/seq` addressing.
    FetchSegment,
}

impl Command {
    /// The two-letter command tag, for commands that carry one.
    #[must_use]
    pub const fn tag(self) -> Option<&'static str> {
        match self {
            Self::Advertise => Some("PA"),
            Self::Unadvertise => Some("PU"),
            Self::Publish => Some("PD"),
            Self::ListTopic => Some("ST"),
            Self::FetchManifest => Some("SM"),
            Self::ListLocal => Some("SL"),
            Self::FetchSegment => None,
        }
    }

    /// The envelope key naming the command's parameter record.
    #[must_use]
    pub const fn params_key(self) -> Option<&'static str> {
        match self {
            Self::Advertise | Self::Unadvertise => Some("pubadvinfo"),
            Self::Publish => Some("pubdatainfo"),
            Self::ListTopic | Self::FetchManifest | Self::ListLocal => Some("subinfo"),
            Self::FetchSegment => None,
        }
    }
}

/// Builds transport requests for every command.
///
/// Holds the session prefix control commands are rooted at and the session
/// default request options. Each built request is stamped with a fresh
/// random nonce unless the session options pin one.
#[derive(Debug, Clone)]
pub struct Encoder {
    prefix: Name,
    options: RequestOptions,
}

impl Encoder {
    /// Create an encoder rooted at `prefix`.
    #[must_use]
    pub const fn new(prefix: Name, options: RequestOptions) -> Self {
        Self { prefix, options }
    }

    /// The session prefix control commands are rooted at.
    #[must_use]
    pub const fn prefix(&self) -> &Name {
        &self.prefix
    }

    /// Build an advertise (`PA`) request.
    pub fn advertise(&self, name: &Name, record: Option<&AdvertisementParams>) -> Result<Request> {
        self.control(Command::Advertise, name, encode_record(record)?)
    }

    /// Build an unadvertise (`PU`) request.
    pub fn unadvertise(
        &self,
        name: &Name,
        record: Option<&AdvertisementParams>,
    ) -> Result<Request> {
        self.control(Command::Unadvertise, name, encode_record(record)?)
    }

    /// Build a publish (`PD`) request announcing `name` at `seq`.
    pub fn publish(&self, name: &Name, seq: u64, record: Option<&PublishParams>) -> Result<Request> {
        self.control(Command::Publish, &name.child(seq), encode_record(record)?)
    }

    /// Build a topic listing (`ST`) request.
    pub fn list_topic(&self, topic: &Name, record: Option<&SubscriptionParams>) -> Result<Request> {
        self.control(Command::ListTopic, topic, encode_record(record)?)
    }

    /// Build a manifest (`SM`) request steered toward `replica`.
    pub fn fetch_manifest(&self, name: &Name, replica: &Name) -> Result<Request> {
        Ok(self
            .control(Command::FetchManifest, name, None)?
            .with_hint(Delegation::new(0, replica.clone())))
    }

    /// Build a local listing (`SL`) request.
    pub fn list_local(&self, topic: &Name, record: Option<&SubscriptionParams>) -> Result<Request> {
        self.control(Command::ListLocal, topic, encode_record(record)?)
    }

    /// Build a segment fetch for `name/seq`, steered toward `replica`.
    ///
    /// Inverts the control-command freshness defaults: a cached segment is
    /// acceptable and the responder's name may extend the requested one,
    /// which lets intermediate stores answer. `lifetime` overrides the
    /// session default for this one request.
    #[must_use]
    pub fn fetch_segment(
        &self,
        name: &Name,
        seq: u64,
        replica: &Name,
        lifetime: Option<Duration>,
    ) -> Request {
        let mut options = self.effective_options();
        options.must_be_fresh = false;
        options.can_be_prefix = true;
        if let Some(lifetime) = lifetime {
            options.lifetime = lifetime;
        }

        Request::new(name.child(seq))
            .with_options(options)
            .with_hint(Delegation::new(0, replica.clone()))
    }

    /// Session default options with a fresh nonce stamped, unless the
    /// session already pins one.
    fn effective_options(&self) -> RequestOptions {
        let mut options = self.options.clone();
        if options.nonce.is_none() {
            options.nonce = Some(rand::random());
        }
        options
    }

    fn control(&self, command: Command, target: &Name, record: Option<Value>) -> Result<Request> {
        let name = match command.tag() {
            Some(tag) => self.prefix.child(tag).join(target),
            None => target.clone(),
        };

        let mut request = Request::new(name).with_options(self.effective_options());
        if let Some(key) = command.params_key() {
            let document = params::envelope(key, record);
            let payload = serde_json::to_vec(&document)
                .map_err(|e| Error::Decode(format!("unencodable parameter envelope: {e}")))?;
            request = request.with_payload(Bytes::from(payload));
        }
        Ok(request)
    }
}

fn encode_record<T: serde::Serialize>(record: Option<&T>) -> Result<Option<Value>> {
    record.map(params::to_document).transpose()
}
