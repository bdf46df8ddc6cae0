//! A transport that holds traffic until it is flushed
//!
//! Stands in for a slow network hop in front of a [`Relay`]: publishes wait
//! in an outbound queue, deliveries wait in an inbound queue, and nothing
//! moves until the owner flushes. Per-direction order is preserved.

use crate::Relay;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::trace;
use verity_core::{Handler, Subscription, Transport, Value};

type Delivery = (Rc<dyn Fn(&Value)>, Value);

/// Delayed link to a relay
///
/// ```
/// use verity_core::Transport;
/// use verity_relay::{DelayedLink, Relay};
///
/// let relay = Relay::new();
/// let link = DelayedLink::new(&relay);
///
/// link.publish("room:state", serde_json::json!(1));
/// assert_eq!(relay.retained("room:state"), None);
///
/// link.flush_outbound();
/// assert_eq!(relay.retained("room:state"), Some(serde_json::json!(1)));
/// ```
pub struct DelayedLink {
    relay: Relay,
    outbound: RefCell<VecDeque<(String, Value)>>,
    inbound: Rc<RefCell<VecDeque<Delivery>>>,
}

impl DelayedLink {
    /// Create a link in front of `relay`
    pub fn new(relay: &Relay) -> Self {
        Self {
            relay: relay.clone(),
            outbound: RefCell::new(VecDeque::new()),
            inbound: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Publish everything queued toward the relay
    ///
    /// Returns the number of payloads sent.
    pub fn flush_outbound(&self) -> usize {
        let mut sent = 0;
        loop {
            let next = self.outbound.borrow_mut().pop_front();
            let Some((channel, payload)) = next else {
                break;
            };
            self.relay.publish(&channel, payload);
            sent += 1;
        }
        trace!(sent, "flushed outbound");
        sent
    }

    /// Hand every queued delivery to its handler
    ///
    /// Returns the number of deliveries made.
    pub fn flush_inbound(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = self.inbound.borrow_mut().pop_front();
            let Some((handler, payload)) = next else {
                break;
            };
            handler(&payload);
            delivered += 1;
        }
        trace!(delivered, "flushed inbound");
        delivered
    }

    /// Flush outbound, then inbound
    pub fn flush(&self) {
        self.flush_outbound();
        self.flush_inbound();
    }

    /// Payloads waiting to reach the relay
    pub fn pending_outbound(&self) -> usize {
        self.outbound.borrow().len()
    }

    /// Deliveries waiting to reach subscribers
    pub fn pending_inbound(&self) -> usize {
        self.inbound.borrow().len()
    }
}

impl Transport for DelayedLink {
    fn publish(&self, channel: &str, payload: Value) {
        self.outbound
            .borrow_mut()
            .push_back((channel.to_string(), payload));
    }

    fn subscribe(&self, channel: &str, handler: Handler) -> Subscription {
        let handler: Rc<dyn Fn(&Value)> = Rc::from(handler);
        let inbound = Rc::clone(&self.inbound);
        self.relay.subscribe(channel, move |payload| {
            inbound
                .borrow_mut()
                .push_back((Rc::clone(&handler), payload.clone()));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_holds_traffic_until_flushed() {
        let relay = Relay::new();
        let link = DelayedLink::new(&relay);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _sub = link.subscribe(
            "c:state",
            Box::new(move |v: &Value| sink.borrow_mut().push(v.clone())),
        );

        link.publish("c:state", json!(1));
        link.publish("c:state", json!(2));
        assert_eq!(link.pending_outbound(), 2);
        assert_eq!(relay.retained("c:state"), None);

        assert_eq!(link.flush_outbound(), 2);
        assert!(seen.borrow().is_empty());
        assert_eq!(link.pending_inbound(), 2);

        assert_eq!(link.flush_inbound(), 2);
        assert_eq!(*seen.borrow(), vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_retained_replay_is_delayed_too() {
        let relay = Relay::new();
        relay.publish("c:state", json!("old"));

        let link = DelayedLink::new(&relay);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _sub = link.subscribe(
            "c:state",
            Box::new(move |v: &Value| sink.borrow_mut().push(v.clone())),
        );
        assert!(seen.borrow().is_empty());

        link.flush();
        assert_eq!(*seen.borrow(), vec![json!("old")]);
    }
}
