//! The relay: named channels, retained values and ordered fan-out

use crate::RelayConfig;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use tracing::{trace, warn};
use verity_core::{Handler, Subscription, Transport, Value};

type SharedHandler = Rc<dyn Fn(&Value)>;

/// Per-channel bookkeeping
#[derive(Default)]
struct Channel {
    /// Last payload published, if this is a retention channel
    retained: Option<Value>,
    /// Attached handlers in attachment order
    handlers: IndexMap<u64, SharedHandler>,
}

impl Channel {
    fn is_idle(&self) -> bool {
        self.retained.is_none() && self.handlers.is_empty()
    }
}

struct RelayState {
    config: RelayConfig,
    channels: HashMap<String, Channel>,
    /// Channels flagged for retention regardless of their name
    flagged: HashSet<String>,
    next_handler: u64,
}

impl RelayState {
    fn retains(&self, channel: &str) -> bool {
        self.flagged.contains(channel) || self.config.retains(channel)
    }

    fn detach(&mut self, channel: &str, handler: u64) {
        let Some(entry) = self.channels.get_mut(channel) else {
            return;
        };
        entry.handlers.shift_remove(&handler);
        if entry.is_idle() {
            self.channels.remove(channel);
        }
    }
}

/// In-memory pub/sub relay
///
/// `Relay` is a cheap handle: clones share the same channels. Construct one
/// per host process (or several in tests) and pass it to the adapter and
/// clients.
///
/// ```
/// use verity_relay::Relay;
/// use std::{cell::RefCell, rc::Rc};
///
/// let relay = Relay::new();
/// relay.publish("counter:state", serde_json::json!({ "version": 1 }));
///
/// // Late subscribers get the retained value before subscribe returns
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = seen.clone();
/// let sub = relay.subscribe("counter:state", move |v| sink.borrow_mut().push(v.clone()));
/// assert_eq!(seen.borrow().len(), 1);
/// sub.unsubscribe();
/// ```
#[derive(Clone)]
pub struct Relay {
    state: Rc<RefCell<RelayState>>,
}

impl Relay {
    /// Create a relay retaining `:state` channels
    pub fn new() -> Self {
        Self::with_config(RelayConfig::default())
    }

    /// Create a relay with a specific configuration
    pub fn with_config(config: RelayConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(RelayState {
                config,
                channels: HashMap::new(),
                flagged: HashSet::new(),
                next_handler: 0,
            })),
        }
    }

    /// Flag `channel` as a retention channel
    pub fn retain(&self, channel: impl Into<String>) {
        self.state.borrow_mut().flagged.insert(channel.into());
    }

    /// Whether publishes to `channel` are retained
    pub fn is_retained(&self, channel: &str) -> bool {
        self.state.borrow().retains(channel)
    }

    /// The retained value for `channel`, if any
    pub fn retained(&self, channel: &str) -> Option<Value> {
        self.state
            .borrow()
            .channels
            .get(channel)
            .and_then(|c| c.retained.clone())
    }

    /// Number of handlers attached to `channel`
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.state
            .borrow()
            .channels
            .get(channel)
            .map_or(0, |c| c.handlers.len())
    }

    /// Publish `payload` to `channel`
    ///
    /// Retains the payload first (on retention channels), then invokes the
    /// handlers attached when the call began, in attachment order. A handler
    /// unsubscribed while the publish is running does not receive it.
    pub fn publish(&self, channel: &str, payload: Value) {
        let (handlers, retained) = {
            let mut state = self.state.borrow_mut();
            let retain = state.retains(channel);
            if retain {
                state
                    .channels
                    .entry(channel.to_string())
                    .or_default()
                    .retained = Some(payload.clone());
            }
            let handlers: Vec<(u64, SharedHandler)> = state
                .channels
                .get(channel)
                .map(|c| c.handlers.iter().map(|(id, h)| (*id, Rc::clone(h))).collect())
                .unwrap_or_default();
            (handlers, retain)
        };

        trace!(channel, handlers = handlers.len(), retained, "publish");
        for (id, handler) in handlers {
            // Skip handlers detached by an earlier handler of this publish
            if self.is_attached(channel, id) {
                deliver(channel, &handler, &payload);
            }
        }
    }

    fn is_attached(&self, channel: &str, handler: u64) -> bool {
        self.state
            .borrow()
            .channels
            .get(channel)
            .is_some_and(|c| c.handlers.contains_key(&handler))
    }

    /// Attach `handler` to `channel`
    ///
    /// If the channel has a retained value, `handler` receives it before
    /// this returns. Unsubscribing never clears the retained value.
    pub fn subscribe(&self, channel: &str, handler: impl Fn(&Value) + 'static) -> Subscription {
        self.attach(channel, Rc::new(handler))
    }

    fn attach(&self, channel: &str, handler: SharedHandler) -> Subscription {
        let (id, replay) = {
            let mut state = self.state.borrow_mut();
            let id = state.next_handler;
            state.next_handler += 1;
            let entry = state.channels.entry(channel.to_string()).or_default();
            entry.handlers.insert(id, Rc::clone(&handler));
            (id, entry.retained.clone())
        };
        trace!(channel, handler = id, replay = replay.is_some(), "subscribe");

        let weak: Weak<RefCell<RelayState>> = Rc::downgrade(&self.state);
        let name = channel.to_string();
        let subscription = Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                state.borrow_mut().detach(&name, id);
                trace!(channel = %name, handler = id, "unsubscribe");
            }
        });

        if let Some(payload) = replay {
            deliver(channel, &handler, &payload);
        }
        subscription
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for Relay {
    fn publish(&self, channel: &str, payload: Value) {
        Relay::publish(self, channel, payload)
    }

    fn subscribe(&self, channel: &str, handler: Handler) -> Subscription {
        self.attach(channel, Rc::from(handler))
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Relay")
            .field("channels", &state.channels.len())
            .field("flagged", &state.flagged)
            .field("config", &state.config)
            .finish()
    }
}

/// Invoke one handler, containing any panic it raises
fn deliver(channel: &str, handler: &SharedHandler, payload: &Value) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(payload))) {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        warn!(channel, %reason, "subscriber panicked, continuing delivery");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    fn recorder() -> (Rc<RefCell<Vec<Value>>>, impl Fn(&Value) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |v: &Value| sink.borrow_mut().push(v.clone()))
    }

    #[test]
    fn test_publish_reaches_all_subscribers_in_order() {
        let relay = Relay::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let first = order.clone();
        let _a = relay.subscribe("c:action", move |_| first.borrow_mut().push("a"));
        let second = order.clone();
        let _b = relay.subscribe("c:action", move |_| second.borrow_mut().push("b"));

        relay.publish("c:action", json!(1));
        relay.publish("c:action", json!(2));

        assert_eq!(*order.borrow(), vec!["a", "b", "a", "b"]);
    }

    #[test]
    fn test_late_join_replays_retained_value() {
        let relay = Relay::new();
        relay.publish("c:state", json!({ "version": 1 }));
        relay.publish("c:state", json!({ "version": 2 }));

        let (seen, handler) = recorder();
        let _sub = relay.subscribe("c:state", handler);

        assert_eq!(*seen.borrow(), vec![json!({ "version": 2 })]);
    }

    #[test]
    fn test_non_retained_channel_does_not_replay() {
        let relay = Relay::new();
        relay.publish("c:action", json!("lost"));

        let (seen, handler) = recorder();
        let _sub = relay.subscribe("c:action", handler);

        assert!(seen.borrow().is_empty());
        assert_eq!(relay.retained("c:action"), None);
    }

    #[test]
    fn test_explicit_retain_flag() {
        let relay = Relay::with_config(RelayConfig::explicit_only());
        relay.publish("c:state", json!(1));
        assert_eq!(relay.retained("c:state"), None);

        relay.retain("feed");
        assert!(relay.is_retained("feed"));
        relay.publish("feed", json!("latest"));

        let (seen, handler) = recorder();
        let _sub = relay.subscribe("feed", handler);
        assert_eq!(*seen.borrow(), vec![json!("latest")]);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_handler() {
        let relay = Relay::new();
        let (seen_a, a) = recorder();
        let (seen_b, b) = recorder();
        let sub_a = relay.subscribe("c:state", a);
        let _sub_b = relay.subscribe("c:state", b);
        assert_eq!(relay.subscriber_count("c:state"), 2);

        sub_a.unsubscribe();
        relay.publish("c:state", json!(9));

        assert!(seen_a.borrow().is_empty());
        assert_eq!(*seen_b.borrow(), vec![json!(9)]);
        assert_eq!(relay.subscriber_count("c:state"), 1);
    }

    #[test]
    fn test_last_unsubscribe_keeps_retained_value() {
        let relay = Relay::new();
        let sub = relay.subscribe("c:state", |_| {});
        relay.publish("c:state", json!("kept"));
        sub.unsubscribe();

        assert_eq!(relay.subscriber_count("c:state"), 0);
        assert_eq!(relay.retained("c:state"), Some(json!("kept")));
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let relay = Relay::new();
        let _bad = relay.subscribe("c:state", |_| panic!("handler failure"));
        let (seen, good) = recorder();
        let _good = relay.subscribe("c:state", good);

        relay.publish("c:state", json!(1));
        relay.publish("c:state", json!(2));

        assert_eq!(*seen.borrow(), vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_channels_are_independent() {
        let relay = Relay::new();
        let (seen, handler) = recorder();
        let _sub = relay.subscribe("a:state", handler);

        relay.publish("b:state", json!("other"));

        assert!(seen.borrow().is_empty());
        assert_eq!(relay.retained("a:state"), None);
        assert_eq!(relay.retained("b:state"), Some(json!("other")));
    }

    #[test]
    fn test_handler_attached_during_publish_misses_it() {
        let relay = Relay::new();
        let late_hits = Rc::new(Cell::new(0));
        let late_subs = Rc::new(RefCell::new(Vec::new()));

        let inner_relay = relay.clone();
        let hits = late_hits.clone();
        let subs = late_subs.clone();
        let _sub = relay.subscribe("c:action", move |_| {
            let hits = hits.clone();
            let sub = inner_relay.subscribe("c:action", move |_| hits.set(hits.get() + 1));
            subs.borrow_mut().push(sub);
        });

        relay.publish("c:action", json!(1));
        assert_eq!(late_hits.get(), 0);

        relay.publish("c:action", json!(2));
        assert_eq!(late_hits.get(), 1);
    }

    #[test]
    fn test_handler_detached_during_publish_misses_it() {
        let relay = Relay::new();
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let target = victim.clone();
        let _first = relay.subscribe("c:state", move |_| {
            if let Some(sub) = target.borrow_mut().take() {
                sub.unsubscribe();
            }
        });
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        *victim.borrow_mut() = Some(relay.subscribe("c:state", move |_| counter.set(counter.get() + 1)));

        relay.publish("c:state", json!(1));

        assert_eq!(hits.get(), 0);
        assert_eq!(relay.subscriber_count("c:state"), 1);
    }

    #[test]
    fn test_relays_do_not_share_state() {
        let a = Relay::new();
        let b = Relay::new();
        a.publish("c:state", json!(1));
        assert_eq!(b.retained("c:state"), None);
    }

    #[test]
    fn test_transport_impl_delegates() {
        let relay = Relay::new();
        let transport: &dyn Transport = &relay;
        let (seen, handler) = recorder();
        let sub = transport.subscribe("c:state", Box::new(handler));

        transport.publish("c:state", json!("via trait"));
        sub.unsubscribe();
        transport.publish("c:state", json!("after"));

        assert_eq!(*seen.borrow(), vec![json!("via trait")]);
    }
}
