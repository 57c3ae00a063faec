//! Response envelope interpretation.
//!
//! Every control response is a JSON envelope with a `status` plus an
//! operation-specific `value`, an optional failure `reason`, and for
//! manifest responses the `fst`/`lst` sequence bounds carried directly on
//! the envelope.

use std::collections::BTreeMap;

use bytes::Bytes;
use namecast_transport::Name;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Sequence range one replica reported for a data name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// The replica that reported the range.
    pub replica: Name,
    /// First available sequence number.
    pub first: u64,
    /// Last available sequence number.
    pub last: u64,
}

/// Sequence range for one data name in a local broker listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalManifest {
    /// The data name.
    pub name: Name,
    /// First available sequence number.
    pub first: u64,
    /// Last available sequence number.
    pub last: u64,
}

/// A local broker's listing: who answered and what it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalListing {
    /// The broker that answered.
    pub broker: Name,
    /// One manifest per data name available there.
    pub manifests: Vec<LocalManifest>,
}

/// The uniform envelope carried by every control response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Envelope {
    status: Option<String>,
    value: Option<Value>,
    reason: Option<String>,
    fst: Option<u64>,
    lst: Option<u64>,
}

impl Envelope {
    /// Parse a response body.
    pub(crate) fn parse(body: &Bytes) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| Error::Decode(format!("invalid response envelope: {e}")))
    }

    /// Whether the responder reported success.
    pub(crate) fn is_ok(&self) -> bool {
        self.status.as_deref() == Some("OK")
    }

    /// The failure reason, or `fallback` when the responder sent none.
    pub(crate) fn reason_or(&self, fallback: &str) -> String {
        self.reason
            .clone()
            .unwrap_or_else(|| fallback.to_owned())
    }

    /// The envelope value read as an integer, when it is one.
    pub(crate) fn value_as_int(&self) -> Option<i64> {
        self.value.as_ref().and_then(Value::as_i64)
    }

    /// The `fst`/`lst` bounds, present only on manifest responses.
    pub(crate) const fn sequence_range(&self) -> Option<(u64, u64)> {
        match (self.fst, self.lst) {
            (Some(first), Some(last)) => Some((first, last)),
            _ => None,
        }
    }

    /// Decode the value as a topic listing: `[name, [replica, ...]]` pairs.
    pub(crate) fn topic_listing(&self) -> Result<BTreeMap<Name, Vec<Name>>> {
        let value = self.value_or("topic listing")?;
        let pairs: Vec<(Name, Vec<Name>)> = Deserialize::deserialize(value)
            .map_err(|e| Error::Decode(format!("malformed topic listing: {e}")))?;
        Ok(pairs.into_iter().collect())
    }

    /// Decode the value as a local broker listing.
    pub(crate) fn local_listing(&self) -> Result<LocalListing> {
        #[derive(Deserialize)]
        struct Wire {
            broker: Name,
            manifests: Vec<(Name, u64, u64)>,
        }

        let value = self.value_or("local listing")?;
        let wire: Wire = Deserialize::deserialize(value)
            .map_err(|e| Error::Decode(format!("malformed local listing: {e}")))?;
        Ok(LocalListing {
            broker: wire.broker,
            manifests: wire
                .manifests
                .into_iter()
                .map(|(name, first, last)| LocalManifest { name, first, last })
                .collect(),
        })
    }

    fn value_or(&self, what: &str) -> Result<&Value> {
        self.value
            .as_ref()
            .ok_or_else(|| Error::Decode(format!("{what} response carries no value")))
    }
}
