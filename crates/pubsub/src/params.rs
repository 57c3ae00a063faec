//! Typed parameter records and their JSON codec.
//!
//! Three records travel inside request parameter envelopes: advertisement
//! options, publish metadata, and subscription options. Encoding is total
//! (every field always maps to its wire key). Decoding resolves the JSON
//! absent/null/present ambiguity per field: absent keys and explicit nulls
//! both collapse to the field type's default, so key-sparse documents from
//! older peers still decode. Construction defaults are richer than decode
//! defaults where the protocol says so (starting sequence, segment budget).

use namecast_transport::Name;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Value, json};

use crate::error::{Error, Result};

/// Where a stream's published segments are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageClass {
    /// Stored at the broker; the storage location is implicit.
    #[default]
    Broker = 0,
    /// Served from the publisher's own storage.
    Publisher = 1,
    /// Stored in a replication store fronted by the broker.
    ReplicationStore = 2,
}

impl Serialize for StorageClass {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(*self as u32)
    }
}

impl<'de> Deserialize<'de> for StorageClass {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match u64::deserialize(deserializer)? {
            0 => Ok(Self::Broker),
            1 => Ok(Self::Publisher),
            2 => Ok(Self::ReplicationStore),
            other => Err(D::Error::custom(format!("unknown storage class {other}"))),
        }
    }
}

/// Visibility scope of a topic, advertisement, or listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scope {
    /// Visible across the whole network.
    #[default]
    Global = 0,
    /// Visible only at the local broker.
    Local = 1,
}

impl Serialize for Scope {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(*self as u32)
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match u64::deserialize(deserializer)? {
            0 => Ok(Self::Global),
            1 => Ok(Self::Local),
            other => Err(D::Error::custom(format!("unknown scope {other}"))),
        }
    }
}

/// Treats an explicit JSON null like an absent key: both take the field
/// type's default, applied once, here.
fn null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Options governing how a data stream is advertised.
///
/// Constructed values describe a broker-stored, globally visible stream
/// starting at sequence 1 with room for 100 segments. Decoding an absent or
/// null field yields the field type's default instead (zero, empty), so the
/// two default sets intentionally differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertisementParams {
    /// Where published segments are stored.
    #[serde(rename = "storagetype", default, deserialize_with = "null_default")]
    pub storage: StorageClass,

    /// Location name of the storage, for classes where it is not implicit.
    #[serde(rename = "storageprefix", default, deserialize_with = "null_default")]
    pub storage_prefix: Name,

    /// The data name being advertised.
    #[serde(rename = "dataname", default, deserialize_with = "null_default")]
    pub name: Name,

    /// Visibility scope of the advertisement.
    #[serde(rename = "topicscope", default, deserialize_with = "null_default")]
    pub scope: Scope,

    /// First sequence number of the stream.
    #[serde(rename = "startseq", default, deserialize_with = "null_default")]
    pub start_seq: u64,

    /// Whether re-advertising an already known name is permitted. When
    /// false the responder refuses the name with reason `Redefine`.
    #[serde(default, deserialize_with = "null_default")]
    pub redefine: bool,

    /// What the storage does once a stream exceeds its segment budget.
    #[serde(
        rename = "actionexceeddatapktcnt",
        default,
        deserialize_with = "null_default"
    )]
    pub overflow_action: String,

    /// Greatest number of segments the storage keeps for the stream.
    #[serde(rename = "maxdatapktcnt", default, deserialize_with = "null_default")]
    pub max_segments: u64,
}

impl Default for AdvertisementParams {
    fn default() -> Self {
        Self {
            storage: StorageClass::Broker,
            storage_prefix: Name::default(),
            name: Name::default(),
            scope: Scope::Global,
            start_seq: 1,
            redefine: false,
            overflow_action: String::new(),
            max_segments: 100,
        }
    }
}

/// Metadata attached to a publish announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishParams {
    /// The data name the announced segments belong to.
    #[serde(rename = "data_prefix", default, deserialize_with = "null_default")]
    pub name: Name,

    /// First announced sequence number.
    #[serde(rename = "data_sseq", default, deserialize_with = "null_default")]
    pub start_seq: u64,

    /// Last announced sequence number; single-segment publishes announce
    /// `start_seq == end_seq`.
    #[serde(rename = "data_eseq", default, deserialize_with = "null_default")]
    pub end_seq: u64,

    /// Prefix identifying the publisher the segments can be pulled from.
    #[serde(rename = "pub_prefix", default, deserialize_with = "null_default")]
    pub publisher_prefix: Name,
}

impl Default for PublishParams {
    fn default() -> Self {
        Self {
            name: Name::default(),
            start_seq: 1,
            end_seq: 1,
            publisher_prefix: Name::default(),
        }
    }
}

/// Options governing listing and subscription commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionParams {
    /// Visibility scope of the listing.
    #[serde(rename = "topicscope", default, deserialize_with = "null_default")]
    pub scope: Scope,

    /// Opaque token forwarded to the service; empty means none.
    #[serde(rename = "servicetoken", default, deserialize_with = "null_default")]
    pub token: String,
}

/// Encode a parameter record into a generic JSON document.
pub fn to_document<T: Serialize>(record: &T) -> Result<Value> {
    serde_json::to_value(record)
        .map_err(|e| Error::Decode(format!("unencodable parameter record: {e}")))
}

/// Decode a parameter record from a generic JSON document.
pub fn from_document<T>(document: &Value) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    T::deserialize(document).map_err(|e| Error::Decode(format!("malformed parameter document: {e}")))
}

/// Wrap an encoded record in the one-key request envelope.
///
/// The key is always present; absent params become an explicit JSON null so
/// a responder can tell "no params" from "malformed params".
#[must_use]
pub fn envelope(key: &str, record: Option<Value>) -> Value {
    json!({ key: record })
}

/// Read a record back out of a request envelope.
///
/// A missing or null key is a valid "no params" state and decodes to
/// `None`; whether `None` is acceptable is the caller's policy.
pub fn from_envelope<T>(envelope: &Value, key: &str) -> Result<Option<T>>
where
    T: for<'de> Deserialize<'de>,
{
    match envelope.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(record) => from_document(record).map(Some),
    }
}
