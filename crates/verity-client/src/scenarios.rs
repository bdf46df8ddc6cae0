//! End-to-end scenarios: relay, adapter and clients wired together

use crate::{ClientConfig, SyncClient};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use verity_core::{ActionId, ChannelSet, Diagnostic, PredictionError, ReadCell, TransitionError, Version};
use verity_host::{Adapter, FailurePolicy, HostConfig};
use verity_relay::{DelayedLink, Relay};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Counter {
    count: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pending: bool,
}

impl Counter {
    fn at(count: i64) -> Self {
        Self {
            count,
            pending: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Op {
    Inc,
    Reject,
}

fn transition(state: &Counter, op: &Op) -> Result<Counter, TransitionError> {
    match op {
        Op::Inc => Ok(Counter::at(state.count + 1)),
        Op::Reject => Err(TransitionError::new("rejected by host")),
    }
}

fn optimistic(state: &Counter, op: &Op) -> Result<Counter, PredictionError> {
    match op {
        Op::Inc => Ok(Counter {
            count: state.count + 1,
            pending: true,
        }),
        Op::Reject => Ok(state.clone()),
    }
}

fn channels() -> ChannelSet {
    ChannelSet::new("counter")
}

fn quiet() -> ClientConfig {
    ClientConfig::default().with_snapshot_on_attach(false)
}

fn host(relay: &Relay) -> Adapter<Counter, Op> {
    Adapter::attach(relay.clone(), channels(), Counter::at(0), transition)
}

#[test]
fn test_counter_round_trip_with_two_clients() {
    let relay = Relay::new();
    let adapter = host(&relay);

    // Client A: direct transport, no predictor
    let a = SyncClient::<Counter, Op>::builder(channels(), Counter::at(0))
        .config(quiet())
        .attach(relay.clone())
        .unwrap();
    assert_eq!(a.send(Op::Inc).unwrap(), ActionId(1));

    assert_eq!(
        relay.retained("counter:state"),
        Some(json!({ "value": { "count": 1 }, "version": 1, "ackId": 1 }))
    );
    assert_eq!(a.pending_count(), 0);
    assert_eq!(a.visible(), Counter::at(1));
    assert!(a.is_connected());

    // Client B: lagged transport, predicts increments as pending
    let lag = Rc::new(DelayedLink::new(&relay));
    let b = SyncClient::builder(channels(), Counter::at(0))
        .config(quiet())
        .predictor(optimistic)
        .attach(Rc::clone(&lag))
        .unwrap();
    assert!(!b.is_connected());

    assert_eq!(b.send(Op::Inc).unwrap(), ActionId(1));
    assert_eq!(
        b.visible(),
        Counter {
            count: 1,
            pending: true
        }
    );

    lag.flush_outbound();
    assert_eq!(adapter.state(), Counter::at(2));
    assert_eq!(
        relay.retained("counter:state"),
        Some(json!({ "value": { "count": 2 }, "version": 2, "ackId": 1 }))
    );

    lag.flush_inbound();
    assert!(b.is_connected());
    assert_eq!(b.confirmed(), Counter::at(2));
    assert_eq!(b.pending_count(), 0);
    assert_eq!(b.visible(), Counter::at(2));
    assert_eq!(b.version(), Some(Version(2)));

    assert_eq!(a.confirmed(), Counter::at(2));
    assert_eq!(a.version(), Some(Version(2)));
}

#[test]
fn test_snapshot_on_attach_connects_to_silent_host() {
    let relay = Relay::new();
    let adapter = host(&relay);
    adapter.dispatch(Op::Inc);
    adapter.dispatch(Op::Inc);
    assert_eq!(adapter.version(), Version(2));

    // Retained value already covers the late joiner
    let late = SyncClient::<Counter, Op>::attach(relay.clone(), channels(), Counter::at(0)).unwrap();
    assert_eq!(late.confirmed(), Counter::at(2));
    assert_eq!(adapter.version(), Version(2));

    // On a relay that retains nothing, the explicit request does the work
    let bare = Relay::with_config(verity_relay::RelayConfig::explicit_only());
    let silent = host(&bare);
    let client = SyncClient::<Counter, Op>::attach(bare.clone(), channels(), Counter::at(-1)).unwrap();
    assert!(client.is_connected());
    assert_eq!(client.confirmed(), Counter::at(0));
    assert_eq!(silent.version(), Version(1));
}

#[test]
fn test_rejected_action_is_settled() {
    let relay = Relay::new();
    let adapter = host(&relay);
    let host_log = Rc::new(RefCell::new(Vec::new()));
    let sink = host_log.clone();
    adapter.on_diagnostic(move |d| sink.borrow_mut().push(d.clone()));

    let client = SyncClient::builder(channels(), Counter::at(0))
        .config(quiet())
        .predictor(optimistic)
        .attach(relay.clone())
        .unwrap();

    client.send(Op::Inc).unwrap();
    client.send(Op::Reject).unwrap();

    assert_eq!(client.pending_count(), 0);
    assert_eq!(client.visible(), Counter::at(1));
    assert_eq!(adapter.state(), Counter::at(1));
    assert_eq!(adapter.version(), Version(2));
    assert_eq!(
        *host_log.borrow(),
        vec![Diagnostic::TransitionFailure {
            action_id: Some(ActionId(2)),
            reason: "rejected by host".to_string(),
        }]
    );
}

#[test]
fn test_dropped_rejection_stays_pending() {
    let relay = Relay::new();
    let adapter = Adapter::attach_with_config(
        relay.clone(),
        channels(),
        Counter::at(0),
        transition,
        HostConfig::default().with_failure_policy(FailurePolicy::Drop),
    );
    let client = SyncClient::<Counter, Op>::builder(channels(), Counter::at(0))
        .config(quiet())
        .attach(relay.clone())
        .unwrap();

    client.send(Op::Reject).unwrap();
    assert_eq!(client.pending_ids(), vec![ActionId(1)]);
    assert_eq!(adapter.version(), Version::ZERO);

    // A later acknowledgment retires it cumulatively
    client.send(Op::Inc).unwrap();
    assert_eq!(client.pending_count(), 0);
    assert_eq!(client.confirmed(), Counter::at(1));
}

#[test]
fn test_clients_converge() {
    let relay = Relay::new();
    let adapter = host(&relay);
    let clients: Vec<SyncClient<Counter, Op>> = (0..3)
        .map(|_| {
            SyncClient::builder(channels(), Counter::at(0))
                .config(quiet())
                .predictor(optimistic)
                .attach(relay.clone())
                .unwrap()
        })
        .collect();

    for round in 0..4 {
        for client in &clients {
            client.send(Op::Inc).unwrap();
        }
        assert_eq!(adapter.version(), Version(3 * (round + 1)));
    }

    for client in &clients {
        assert_eq!(client.confirmed(), Counter::at(12));
        assert_eq!(client.visible(), Counter::at(12));
        assert_eq!(client.pending_count(), 0);
        assert_eq!(client.version(), Some(Version(12)));
        assert_eq!(client.next_id(), ActionId(5));
    }
}

#[test]
fn test_send_from_watcher_is_sequenced() {
    let relay = Relay::new();
    let adapter = host(&relay);
    let client = Rc::new(
        SyncClient::<Counter, Op>::builder(channels(), Counter::at(0))
            .config(quiet())
            .attach(relay.clone())
            .unwrap(),
    );

    let observed = Rc::new(RefCell::new(Vec::new()));
    let sink = observed.clone();
    let _versions = relay.subscribe("counter:state", move |v| {
        sink.borrow_mut().push(v["version"].as_u64().unwrap_or_default());
    });

    let weak = Rc::downgrade(&client);
    let _on_connect = client.connected_cell().watch(Box::new(move |_: &bool| {
        if let Some(client) = weak.upgrade() {
            client.send(Op::Inc).unwrap();
        }
    }));

    client.request_snapshot();

    assert_eq!(*observed.borrow(), vec![1, 2]);
    assert_eq!(adapter.state(), Counter::at(1));
    assert_eq!(client.confirmed(), Counter::at(1));
    assert_eq!(client.pending_count(), 0);
}

#[test]
fn test_detached_client_leaves_others_untouched() {
    let relay = Relay::new();
    let adapter = host(&relay);
    let stays = SyncClient::<Counter, Op>::builder(channels(), Counter::at(0))
        .config(quiet())
        .attach(relay.clone())
        .unwrap();
    let leaves = SyncClient::<Counter, Op>::builder(channels(), Counter::at(0))
        .config(quiet())
        .attach(relay.clone())
        .unwrap();

    leaves.send(Op::Inc).unwrap();
    let frozen = leaves.visible_cell();
    leaves.detach();

    stays.send(Op::Inc).unwrap();

    assert_eq!(adapter.state(), Counter::at(2));
    assert_eq!(stays.confirmed(), Counter::at(2));
    assert_eq!(frozen.get(), Counter::at(1));
}

#[test]
fn test_unknown_action_from_client_is_acknowledged() {
    let relay = Relay::new();
    let adapter = host(&relay);
    // A newer client speaking an action this host does not know
    let client = SyncClient::<Counter, serde_json::Value>::builder(channels(), Counter::at(0))
        .config(quiet())
        .attach(relay.clone())
        .unwrap();

    client.send(json!({ "type": "launch" })).unwrap();

    assert_eq!(adapter.state(), Counter::at(0));
    assert_eq!(adapter.version(), Version(1));
    assert_eq!(client.pending_count(), 0);
    assert!(client.is_connected());

    client.send(json!({ "type": "inc" })).unwrap();
    assert_eq!(client.confirmed(), Counter::at(1));
    assert_eq!(adapter.last_ack(), Some(ActionId(2)));
}
