//! End-to-end session tests against a scripted broker on the in-memory
//! fabric.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use namecast_pubsub::{AdvertisementParams, Error, Manifest, Pubsub, StorageClass};
use namecast_transport::{Name, Request, RequestOptions, ServeHandler, Transport};
use namecast_transport_memory::MemoryNetwork;
use serde_json::{Value, json};

const SERVICE: &str = "/svc/broker";

fn session(network: &MemoryNetwork) -> Pubsub<MemoryNetwork> {
    Pubsub::new(network.clone(), Name::new(SERVICE))
}

fn split_command(name: &Name) -> Option<(String, Name)> {
    let rest = name.strip_prefix(&Name::new(SERVICE))?;
    let mut components = rest.components();
    let tag = components.next()?.to_owned();
    let target = components.fold(Name::default(), |acc, component| acc.child(component));
    Some((tag, target))
}

/// Serve a synchronous command script on the service prefix.
async fn serve_script<F>(network: &MemoryNetwork, respond: F)
where
    F: Fn(&str, &Name) -> Value + Send + Sync + 'static,
{
    let respond = Arc::new(respond);
    let handler: ServeHandler = Arc::new(move |name: Name| {
        let respond = Arc::clone(&respond);
        Box::pin(async move {
            let (tag, target) = split_command(&name)?;
            Some(Bytes::from(respond(&tag, &target).to_string()))
        })
    });
    network.serve(Name::new(SERVICE), handler).await.unwrap();
}

fn payload_json(request: &Request) -> Value {
    serde_json::from_slice(request.payload.as_ref().unwrap()).unwrap()
}

#[tokio::test]
async fn advertise_round_trip_and_redefine_refusal() {
    let _ = tracing_subscriber::fmt::try_init();

    let network = MemoryNetwork::new();
    let advertised: Arc<Mutex<HashSet<Name>>> = Arc::new(Mutex::new(HashSet::new()));
    let state = Arc::clone(&advertised);
    serve_script(&network, move |tag, target| {
        assert_eq!(tag, "PA");
        if state.lock().unwrap().insert(target.clone()) {
            json!({ "status": "OK" })
        } else {
            json!({ "status": "ERR", "reason": "Redefine" })
        }
    })
    .await;

    let pubsub = session(&network);
    let name = Name::new("/city/weather/a");

    pubsub.advertise(&name, None).await.unwrap();

    let error = pubsub.advertise(&name, None).await.unwrap_err();
    assert_eq!(error.to_string(), "Redefine");
    assert!(matches!(error, Error::Application(_)));

    let log = network.submitted();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].name.as_str(), "/svc/broker/PA/city/weather/a");

    // The record's data name is filled from the target; the remaining
    // fields carry the construction defaults.
    let record = &payload_json(&log[0])["pubadvinfo"];
    assert_eq!(record["dataname"], json!("/city/weather/a"));
    assert_eq!(record["storagetype"], json!(0));
    assert_eq!(record["storageprefix"], json!(""));
    assert_eq!(record["topicscope"], json!(0));
    assert_eq!(record["startseq"], json!(1));
    assert_eq!(record["redefine"], json!(false));
    assert_eq!(record["maxdatapktcnt"], json!(100));
}

#[tokio::test]
async fn advertise_with_contradictory_storage_sends_nothing() {
    let _ = tracing_subscriber::fmt::try_init();

    let network = MemoryNetwork::new();
    let pubsub = session(&network);
    let params = AdvertisementParams {
        storage: StorageClass::Broker,
        storage_prefix: Name::new("/store/a"),
        ..AdvertisementParams::default()
    };

    let error = pubsub
        .advertise(&Name::new("/city/weather/a"), Some(params))
        .await
        .unwrap_err();
    assert_eq!(
        error.to_string(),
        "Storagetype not PUBLISHER or DIFS given /store/a"
    );
    assert!(network.submitted().is_empty());
}

#[tokio::test]
async fn unadvertise_masks_only_the_responders_refusal() {
    let _ = tracing_subscriber::fmt::try_init();

    let network = MemoryNetwork::new();
    serve_script(&network, |tag, target| {
        assert_eq!(tag, "PU");
        if target == &Name::new("/city/weather/known") {
            json!({ "status": "OK" })
        } else {
            json!({ "status": "ERR", "reason": "Undefined" })
        }
    })
    .await;

    let pubsub = session(&network);

    pubsub
        .unadvertise(&Name::new("/city/weather/known"), None, false)
        .await
        .unwrap();

    let error = pubsub
        .unadvertise(&Name::new("/city/weather/other"), None, false)
        .await
        .unwrap_err();
    assert_eq!(error.to_string(), "Undefined");

    pubsub
        .unadvertise(&Name::new("/city/weather/other"), None, true)
        .await
        .unwrap();

    // Transport failures are never masked, even with allow_undefined.
    let dead = Pubsub::new(MemoryNetwork::new(), Name::new(SERVICE));
    let error = dead
        .unadvertise(&Name::new("/city/weather/other"), None, true)
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Unreachable));
}

#[tokio::test]
async fn publish_serves_the_pull_and_withdraws_the_route() {
    let _ = tracing_subscriber::fmt::try_init();

    let network = MemoryNetwork::new();
    let fabric = network.clone();
    let handler: ServeHandler = Arc::new(move |name: Name| {
        let fabric = fabric.clone();
        Box::pin(async move {
            let (tag, target) = split_command(&name)?;
            assert_eq!(tag, "PD");
            let parts: Vec<String> = target.components().map(str::to_owned).collect();
            let seq: u64 = parts.last()?.parse().ok()?;
            let dataname = parts[..parts.len() - 1]
                .iter()
                .fold(Name::default(), |acc, component| acc.child(component));
            // Pull the announced segment from the publisher; the fabric
            // keeps a cached copy for later fetches.
            fabric.submit(Request::new(dataname.child(seq))).await.ok()?;
            Some(Bytes::from(json!({ "status": "OK", "value": 1 }).to_string()))
        })
    });
    network.serve(Name::new(SERVICE), handler).await.unwrap();

    let mut pubsub = session(&network);
    pubsub.set_publisher_prefix(Name::new("/pub/1"));
    let name = Name::new("/city/weather/a");

    pubsub
        .publish(&name, 3, Bytes::from_static(b"23.5C"))
        .await
        .unwrap();

    // The serve route lives only for the duration of the exchange.
    assert!(!network.has_route(&name));

    // The pulled segment stayed cached, so a subscriber fetch succeeds
    // even though the publisher route is gone.
    let payload = pubsub
        .fetch_segment(&name, 3, &Name::new(SERVICE), None)
        .await
        .unwrap();
    assert_eq!(payload, Bytes::from_static(b"23.5C"));

    let log = network.submitted();
    let announce = log
        .iter()
        .find(|request| request.name.as_str() == "/svc/broker/PD/city/weather/a/3")
        .unwrap();
    let record = &payload_json(announce)["pubdatainfo"];
    assert_eq!(record["data_prefix"], json!("/city/weather/a"));
    assert_eq!(record["data_sseq"], json!(3));
    assert_eq!(record["data_eseq"], json!(3));
    assert_eq!(record["pub_prefix"], json!("/pub/1"));

    // The broker's pull itself went through the fabric.
    assert!(
        log.iter()
            .any(|request| request.name.as_str() == "/city/weather/a/3")
    );
}

#[tokio::test]
async fn publish_with_unexpected_stored_count_fails() {
    let _ = tracing_subscriber::fmt::try_init();

    let network = MemoryNetwork::new();
    serve_script(&network, |_tag, _target| json!({ "status": "OK", "value": 2 })).await;

    let pubsub = session(&network);
    let name = Name::new("/city/weather/a");

    let error = pubsub
        .publish(&name, 1, Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert_eq!(error.to_string(), "Unknown publish error");

    // The route is withdrawn on failure too.
    assert!(!network.has_route(&name));
}

#[tokio::test]
async fn list_topic_builds_the_replica_map() {
    let _ = tracing_subscriber::fmt::try_init();

    let network = MemoryNetwork::new();
    serve_script(&network, |tag, _target| {
        assert_eq!(tag, "ST");
        json!({
            "status": "OK",
            "value": [["/a/1", ["/r1"]], ["/a/2", ["/r1", "/r2"]]],
        })
    })
    .await;

    let listing = session(&network)
        .list_topic(&Name::new("/a"), None)
        .await
        .unwrap();

    let mut expected = BTreeMap::new();
    expected.insert(Name::new("/a/1"), vec![Name::new("/r1")]);
    expected.insert(Name::new("/a/2"), vec![Name::new("/r1"), Name::new("/r2")]);
    assert_eq!(listing, expected);

    // Omitted params become a concrete global-scope record.
    let log = network.submitted();
    assert_eq!(
        payload_json(&log[0]),
        json!({ "subinfo": { "topicscope": 0, "servicetoken": "" } })
    );
}

#[tokio::test]
async fn fetch_manifest_reads_envelope_bounds() {
    let _ = tracing_subscriber::fmt::try_init();

    let network = MemoryNetwork::new();
    serve_script(&network, |tag, _target| {
        assert_eq!(tag, "SM");
        json!({ "status": "OK", "fst": 1, "lst": 9 })
    })
    .await;

    let replica = Name::new("/replica/2");
    let manifest = session(&network)
        .fetch_manifest(&Name::new("/city/weather/a"), &replica)
        .await
        .unwrap();
    assert_eq!(
        manifest,
        Manifest {
            replica: replica.clone(),
            first: 1,
            last: 9,
        }
    );

    let log = network.submitted();
    assert_eq!(log[0].name.as_str(), "/svc/broker/SM/city/weather/a");
    assert_eq!(log[0].hints.len(), 1);
    assert_eq!(log[0].hints[0].preference, 0);
    assert_eq!(log[0].hints[0].name, replica);
    assert_eq!(payload_json(&log[0]), json!({ "subinfo": null }));
}

#[tokio::test]
async fn manifest_without_bounds_is_a_decode_failure() {
    let _ = tracing_subscriber::fmt::try_init();

    let network = MemoryNetwork::new();
    serve_script(&network, |_tag, _target| json!({ "status": "OK", "fst": 1 })).await;

    let error = session(&network)
        .fetch_manifest(&Name::new("/city/weather/a"), &Name::new("/replica/2"))
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Decode(_)));
}

#[tokio::test]
async fn list_local_defaults_to_local_scope() {
    let _ = tracing_subscriber::fmt::try_init();

    let network = MemoryNetwork::new();
    serve_script(&network, |tag, _target| {
        assert_eq!(tag, "SL");
        json!({
            "status": "OK",
            "value": {
                "broker": "/svc/broker",
                "manifests": [["/a/1", 1, 5]],
            },
        })
    })
    .await;

    let listing = session(&network)
        .list_local(&Name::new("/a"), None)
        .await
        .unwrap();
    assert_eq!(listing.broker, Name::new("/svc/broker"));
    assert_eq!(listing.manifests.len(), 1);
    assert_eq!(listing.manifests[0].name, Name::new("/a/1"));
    assert_eq!(listing.manifests[0].first, 1);
    assert_eq!(listing.manifests[0].last, 5);

    // Unlike every other command, omitted params default to local scope.
    let log = network.submitted();
    assert_eq!(
        payload_json(&log[0]),
        json!({ "subinfo": { "topicscope": 1, "servicetoken": "" } })
    );
}

#[tokio::test]
async fn no_route_reports_unreachable() {
    let _ = tracing_subscriber::fmt::try_init();

    let pubsub = Pubsub::new(MemoryNetwork::new(), Name::new(SERVICE));
    let error = pubsub
        .advertise(&Name::new("/city/weather/a"), None)
        .await
        .unwrap_err();
    assert_eq!(error.to_string(), "Unreachable");
}

#[tokio::test]
async fn unanswered_request_reports_timeout() {
    let _ = tracing_subscriber::fmt::try_init();

    let network = MemoryNetwork::new();
    let handler: ServeHandler = Arc::new(|_name| Box::pin(async { None }));
    network.serve(Name::new(SERVICE), handler).await.unwrap();

    let options = RequestOptions {
        lifetime: Duration::from_millis(50),
        ..RequestOptions::default()
    };
    let pubsub = Pubsub::with_options(network.clone(), Name::new(SERVICE), options);

    let error = pubsub
        .advertise(&Name::new("/city/weather/a"), None)
        .await
        .unwrap_err();
    assert_eq!(error.to_string(), "Timeout");
}
