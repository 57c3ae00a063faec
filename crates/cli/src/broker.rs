//! A minimal in-process broker for the demonstration walkthrough.
//!
//! Keeps advertisement and manifest bookkeeping in memory and answers the
//! control commands a session issues. Announced segments are pulled from
//! the publisher while its publish route is open, leaving the fabric's
//! content store to serve later subscriber fetches.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bytes::Bytes;
use namecast_transport::{Name, Registration, Request, ServeHandler, Transport, TransportError};
use namecast_transport_memory::MemoryNetwork;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct State {
    advertised: Mutex<BTreeSet<Name>>,
    manifests: Mutex<BTreeMap<Name, (u64, u64)>>,
}

/// An in-memory broker bound to one service prefix.
#[derive(Debug)]
pub struct Broker {
    registration: Box<dyn Registration>,
}

impl Broker {
    /// Register the broker on `prefix` and start answering commands.
    pub async fn start(network: MemoryNetwork, prefix: Name) -> Result<Self, TransportError> {
        let state = Arc::new(State::default());
        let handler: ServeHandler = {
            let prefix = prefix.clone();
            let network = network.clone();
            Arc::new(move |name: Name| {
                let state = Arc::clone(&state);
                let prefix = prefix.clone();
                let network = network.clone();
                Box::pin(async move { answer(&state, &prefix, &network, &name).await })
            })
        };

        let registration = network.serve(prefix.clone(), handler).await?;
        info!(%prefix, "broker serving");
        Ok(Self { registration })
    }

    /// Withdraw the broker's route.
    pub async fn shutdown(self) -> Result<(), TransportError> {
        self.registration.close().await
    }
}

async fn answer(
    state: &State,
    prefix: &Name,
    network: &MemoryNetwork,
    name: &Name,
) -> Option<Bytes> {
    let rest = name.strip_prefix(prefix)?;
    let mut components = rest.components();
    let tag = components.next()?.to_owned();
    let target = components.fold(Name::default(), |acc, component| acc.child(component));
    debug!(%tag, %target, "command received");

    let reply = match tag.as_str() {
        "PA" => advertise(state, target),
        "PU" => unadvertise(state, &target),
        "PD" => publish(state, network, &target).await,
        "ST" => list_topic(state, prefix, &target),
        "SM" => manifest(state, &target),
        "SL" => list_local(state, prefix, &target),
        _ => json!({ "status": "ERR", "reason": "UnknownCommand" }),
    };
    Some(Bytes::from(reply.to_string()))
}

fn advertise(state: &State, name: Name) -> Value {
    if state.advertised.lock().insert(name) {
        json!({ "status": "OK" })
    } else {
        json!({ "status": "ERR", "reason": "Redefine" })
    }
}

fn unadvertise(state: &State, name: &Name) -> Value {
    if state.advertised.lock().remove(name) {
        state.manifests.lock().remove(name);
        json!({ "status": "OK" })
    } else {
        json!({ "status": "ERR", "reason": "Undefined" })
    }
}

async fn publish(state: &State, network: &MemoryNetwork, target: &Name) -> Value {
    let Some((name, seq)) = split_sequence(target) else {
        return json!({ "status": "ERR", "reason": "BadName" });
    };
    if !state.advertised.lock().contains(&name) {
        return json!({ "status": "ERR", "reason": "Undefined" });
    }

    // Pull the announced segment while the publisher's route is open; the
    // fabric keeps a cached copy for later subscriber fetches.
    if network.submit(Request::new(target.clone())).await.is_err() {
        return json!({ "status": "ERR", "reason": "NoData" });
    }

    let mut manifests = state.manifests.lock();
    let range = manifests.entry(name).or_insert((seq, seq));
    range.0 = range.0.min(seq);
    range.1 = range.1.max(seq);
    json!({ "status": "OK", "value": 1 })
}

fn split_sequence(target: &Name) -> Option<(Name, u64)> {
    let components: Vec<&str> = target.components().collect();
    let (seq, name) = components.split_last()?;
    let seq = seq.parse().ok()?;
    let name = name
        .iter()
        .fold(Name::default(), |acc, component| acc.child(component));
    Some((name, seq))
}

fn list_topic(state: &State, prefix: &Name, topic: &Name) -> Value {
    let advertised = state.advertised.lock();
    let listing: Vec<Value> = advertised
        .iter()
        .filter(|name| name.starts_with(topic))
        .map(|name| json!([name, [prefix]]))
        .collect();
    json!({ "status": "OK", "value": listing })
}

fn manifest(state: &State, name: &Name) -> Value {
    state.manifests.lock().get(name).map_or_else(
        || json!({ "status": "ERR", "reason": "NoSuchName" }),
        |&(first, last)| json!({ "status": "OK", "fst": first, "lst": last }),
    )
}

fn list_local(state: &State, prefix: &Name, topic: &Name) -> Value {
    let manifests = state.manifests.lock();
    let listing: Vec<Value> = manifests
        .iter()
        .filter(|(name, _)| name.starts_with(topic))
        .map(|(name, &(first, last))| json!([name, first, last]))
        .collect();
    json!({
        "status": "OK",
        "value": { "broker": prefix, "manifests": listing },
    })
}
