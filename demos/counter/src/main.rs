//! Shared Counter Demo
//!
//! One host owns a counter. Two clients increment it: one on a direct link,
//! one behind a link that holds traffic until it is flushed, so its
//! optimistic prediction is visible before the host answers.

use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use verity_client::{ClientConfig, SyncClient};
use verity_core::{ChannelSet, PredictionError, ReadCell, TransitionError};
use verity_host::{Adapter, HostConfig};
use verity_relay::{DelayedLink, Relay, RelayConfig};

const RELAY_CONFIG: &str = r#"(retain_suffixes: [":state"])"#;
const HOST_CONFIG: &str = "(failure_policy: Settle)";
const CLIENT_CONFIG: &str = "(max_pending: 16, snapshot_on_attach: false)";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Counter {
    count: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Op {
    Inc,
    Add { amount: i64 },
}

fn apply(state: &Counter, op: &Op) -> Result<Counter, TransitionError> {
    let delta = match op {
        Op::Inc => 1,
        Op::Add { amount } => *amount,
    };
    let count = state
        .count
        .checked_add(delta)
        .ok_or_else(|| TransitionError::new("counter overflow"))?;
    Ok(Counter {
        count,
        pending: false,
    })
}

fn predict(state: &Counter, op: &Op) -> Result<Counter, PredictionError> {
    let next = apply(state, op).map_err(|e| PredictionError::new(e.message()))?;
    Ok(Counter {
        pending: true,
        ..next
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Verity Shared Counter Demo ===\n");

    let relay = Relay::with_config(RelayConfig::from_ron(RELAY_CONFIG)?);
    let channels = ChannelSet::new("counter");

    let host = Adapter::attach_with_config(
        relay.clone(),
        channels.clone(),
        Counter::default(),
        apply,
        HostConfig::from_ron(HOST_CONFIG)?,
    );
    host.on_diagnostic(|d| tracing::warn!("host: {d}"));

    let client_config = ClientConfig::from_ron(CLIENT_CONFIG)?;

    let alice = SyncClient::builder(channels.clone(), Counter::default())
        .config(client_config.clone())
        .predictor(predict)
        .attach(relay.clone())?;

    let link = Rc::new(DelayedLink::new(&relay));
    let bob = SyncClient::builder(channels.clone(), Counter::default())
        .config(client_config)
        .predictor(predict)
        .on_diagnostic(|d| tracing::debug!("bob: {d}"))
        .attach(Rc::clone(&link))?;

    let _bob_view = bob.visible_cell().watch(Box::new(|c: &Counter| {
        println!("  bob sees {} (pending: {})", c.count, c.pending);
    }));

    println!("Alice increments on a direct link:");
    let id = alice.send(Op::Inc)?;
    println!(
        "  alice sent {id}, host at {} {:?}, alice pending {}\n",
        host.version(),
        host.state(),
        alice.pending_count()
    );

    println!("Bob adds 5 on a slow link:");
    let id = bob.send(Op::Add { amount: 5 })?;
    println!(
        "  bob sent {id}, host still at {} with count {}\n",
        host.version(),
        host.with_state(|c| c.count)
    );

    println!("Link flushed:");
    println!(
        "  {} queued toward the host, {} toward bob",
        link.pending_outbound(),
        link.pending_inbound()
    );
    link.flush();
    println!(
        "  host {} count {}, bob confirmed {:?}, bob pending {}\n",
        host.version(),
        host.with_state(|c| c.count),
        bob.confirmed(),
        bob.pending_count()
    );

    let late = SyncClient::<Counter, Op>::attach(relay.clone(), channels, Counter::default())?;
    println!(
        "Late joiner connected: {}, sees {} at {:?}",
        late.connected_cell().get(),
        late.confirmed().count,
        late.version()
    );

    Ok(())
}
