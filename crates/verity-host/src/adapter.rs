//! Adapter - the single authority over one state instance
//!
//! The adapter owns the authoritative state and its version counter. Every
//! inbound action goes through one sequential queue: apply the transition,
//! stamp the next version, publish the broadcast, then take the next item.
//! Actions published while a broadcast is being delivered (for example by
//! a client reacting to it) wait in the queue until the current item is done.

use crate::config::{FailurePolicy, HostConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use tracing::{debug, trace};
use verity_core::{
    decode, encode, ActionEnvelope, ActionId, Broadcast, ChannelSet, Diagnostic, Diagnostics,
    Subscription, TransitionError, Transport, Value, Version,
};

/// Boxed host transition function
pub type TransitionFn<S, A> = Box<dyn Fn(&S, &A) -> Result<S, TransitionError>>;

/// An item waiting in the inbound queue
enum Inbound<A> {
    /// Action published by a client
    Remote(ActionEnvelope<A>),
    /// Action dispatched by the host itself
    Local(A),
    /// Well-formed envelope whose action the host does not know
    Unrecognized(ActionId),
    /// Snapshot request
    Snapshot,
}

/// The authoritative record
struct Authority<S> {
    state: S,
    version: Version,
    /// Id of the most recently settled client action
    last_ack: Option<ActionId>,
}

/// Resets the draining flag even if a transition panics
struct DrainGuard<'a>(&'a Cell<bool>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

struct Host<S, A> {
    channels: ChannelSet,
    transport: Box<dyn Transport>,
    transition: TransitionFn<S, A>,
    config: HostConfig,
    diagnostics: Diagnostics,
    authority: RefCell<Authority<S>>,
    inbox: RefCell<VecDeque<Inbound<A>>>,
    draining: Cell<bool>,
}

impl<S, A> Host<S, A>
where
    S: Serialize + 'static,
    A: 'static,
{
    fn enqueue(&self, item: Inbound<A>) {
        self.inbox.borrow_mut().push_back(item);
        self.drain();
    }

    fn drain(&self) {
        if self.draining.replace(true) {
            trace!(
                instance = self.channels.instance(),
                queued = self.inbox.borrow().len(),
                "queued behind in-flight item"
            );
            return;
        }
        let _guard = DrainGuard(&self.draining);

        loop {
            let next = self.inbox.borrow_mut().pop_front();
            let Some(item) = next else {
                break;
            };

            let mut diagnostics = Vec::new();
            let payload = self.process(item, &mut diagnostics);
            for diagnostic in diagnostics {
                self.diagnostics.report(diagnostic);
            }
            if let Some(payload) = payload {
                self.transport.publish(self.channels.state(), payload);
            }
        }
    }

    fn process(&self, item: Inbound<A>, diagnostics: &mut Vec<Diagnostic>) -> Option<Value> {
        match item {
            Inbound::Remote(envelope) => self.apply(&envelope.action, Some(envelope.id), diagnostics),
            Inbound::Local(action) => self.apply(&action, None, diagnostics),
            Inbound::Unrecognized(id) => {
                // No-op transition: unchanged state, still acknowledged
                let mut authority = self.authority.borrow_mut();
                let payload = self.stamp(&mut authority, Some(id), diagnostics);
                if payload.is_some() {
                    authority.last_ack = Some(id);
                }
                payload
            }
            Inbound::Snapshot => {
                let mut authority = self.authority.borrow_mut();
                let ack = authority.last_ack;
                self.stamp(&mut authority, ack, diagnostics)
            }
        }
    }

    fn apply(
        &self,
        action: &A,
        ack: Option<ActionId>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<Value> {
        // A panicking transition is settled like any other failure
        let caught = catch_unwind(AssertUnwindSafe(|| {
            let authority = self.authority.borrow();
            (self.transition)(&authority.state, action)
        }));
        let outcome = caught
            .unwrap_or_else(|panic| Err(TransitionError::new(panic_reason(panic.as_ref()))));

        let mut authority = self.authority.borrow_mut();
        match outcome {
            Ok(next) => {
                let previous = std::mem::replace(&mut authority.state, next);
                match self.stamp(&mut authority, ack, diagnostics) {
                    Some(payload) => {
                        if ack.is_some() {
                            authority.last_ack = ack;
                        }
                        Some(payload)
                    }
                    None => {
                        // Nothing went out, so nothing changed
                        authority.state = previous;
                        None
                    }
                }
            }
            Err(err) => {
                diagnostics.push(Diagnostic::TransitionFailure {
                    action_id: ack,
                    reason: err.to_string(),
                });
                match (self.config.failure_policy, ack) {
                    (FailurePolicy::Settle, Some(id)) => {
                        let payload = self.stamp(&mut authority, Some(id), diagnostics);
                        if payload.is_some() {
                            authority.last_ack = Some(id);
                        }
                        payload
                    }
                    _ => None,
                }
            }
        }
    }

    /// Encode the current state under the next version
    ///
    /// The counter only advances once the payload is ready to publish.
    fn stamp(
        &self,
        authority: &mut Authority<S>,
        ack: Option<ActionId>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<Value> {
        let version = authority.version.next();
        let encoded = encode(&Broadcast::new(&authority.state, version).with_ack(ack));
        match encoded {
            Ok(payload) => {
                authority.version = version;
                debug!(
                    instance = self.channels.instance(),
                    %version,
                    ack_id = ?ack,
                    "broadcast"
                );
                Some(payload)
            }
            Err(err) => {
                diagnostics.push(Diagnostic::TransportFailure {
                    channel: self.channels.state().to_string(),
                    reason: err.to_string(),
                });
                None
            }
        }
    }
}

/// Message carried by a caught panic
fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(reason) = panic.downcast_ref::<&str>() {
        format!("transition panicked: {reason}")
    } else if let Some(reason) = panic.downcast_ref::<String>() {
        format!("transition panicked: {reason}")
    } else {
        "transition panicked".to_string()
    }
}

/// Authoritative adapter for one state instance
///
/// Subscribes to the instance's action and snapshot channels on attach and
/// publishes versioned broadcasts to its state channel. The adapter never
/// broadcasts on its own initiative: only applied actions (remote or
/// [`Adapter::dispatch`]ed) and snapshot requests produce broadcasts.
///
/// An envelope whose `action` does not decode into `A` is treated as a
/// no-op: the unchanged state goes out under the next version with the
/// envelope's id as `ackId`. Envelopes that are not `{ action, id }` at all
/// are rejected and reported.
///
/// ```
/// use verity_core::{ChannelSet, TransitionError};
/// use verity_host::Adapter;
/// use verity_relay::Relay;
///
/// let relay = Relay::new();
/// let adapter = Adapter::attach(relay.clone(), ChannelSet::new("total"), 0i64, |total: &i64, delta: &i64| {
///     total.checked_add(*delta).ok_or_else(|| TransitionError::new("overflow"))
/// });
///
/// relay.publish("total:action", serde_json::json!({ "action": 5, "id": 1 }));
/// assert_eq!(adapter.state(), 5);
/// assert_eq!(adapter.version().get(), 1);
/// ```
pub struct Adapter<S, A> {
    host: Rc<Host<S, A>>,
    subscriptions: Vec<Subscription>,
}

impl<S, A> Adapter<S, A>
where
    S: Serialize + Clone + 'static,
    A: DeserializeOwned + 'static,
{
    /// Attach an adapter with the default configuration
    pub fn attach<T, F>(transport: T, channels: ChannelSet, initial: S, transition: F) -> Self
    where
        T: Transport + 'static,
        F: Fn(&S, &A) -> Result<S, TransitionError> + 'static,
    {
        Self::attach_with_config(transport, channels, initial, transition, HostConfig::default())
    }

    /// Attach an adapter with a specific configuration
    pub fn attach_with_config<T, F>(
        transport: T,
        channels: ChannelSet,
        initial: S,
        transition: F,
        config: HostConfig,
    ) -> Self
    where
        T: Transport + 'static,
        F: Fn(&S, &A) -> Result<S, TransitionError> + 'static,
    {
        let host = Rc::new(Host {
            channels,
            transport: Box::new(transport),
            transition: Box::new(transition),
            config,
            diagnostics: Diagnostics::new(),
            authority: RefCell::new(Authority {
                state: initial,
                version: Version::ZERO,
                last_ack: None,
            }),
            inbox: RefCell::new(VecDeque::new()),
            draining: Cell::new(false),
        });

        let actions = {
            let weak = Rc::downgrade(&host);
            let channel = host.channels.action().to_string();
            host.transport.subscribe(
                host.channels.action(),
                Box::new(move |payload: &Value| {
                    let Some(host) = weak.upgrade() else {
                        return;
                    };
                    let envelope = match decode::<ActionEnvelope<Value>>(&channel, payload) {
                        Ok(envelope) => envelope,
                        Err(err) => {
                            host.diagnostics.report(Diagnostic::TransportFailure {
                                channel: channel.clone(),
                                reason: err.to_string(),
                            });
                            return;
                        }
                    };
                    let id = envelope.id;
                    match decode::<A>(&channel, &envelope.action) {
                        Ok(action) => {
                            trace!(channel = %channel, %id, "inbound action");
                            host.enqueue(Inbound::Remote(ActionEnvelope::new(id, action)));
                        }
                        Err(err) => {
                            debug!(channel = %channel, %id, reason = %err, "unrecognized action");
                            host.enqueue(Inbound::Unrecognized(id));
                        }
                    }
                }),
            )
        };

        let snapshots = {
            let weak = Rc::downgrade(&host);
            host.transport.subscribe(
                host.channels.snapshot(),
                Box::new(move |_: &Value| {
                    if let Some(host) = weak.upgrade() {
                        host.enqueue(Inbound::Snapshot);
                    }
                }),
            )
        };

        debug!(instance = host.channels.instance(), policy = ?host.config.failure_policy, "adapter attached");
        Self {
            host,
            subscriptions: vec![actions, snapshots],
        }
    }

    /// Apply a host-side action
    ///
    /// Goes through the same sequential queue as client actions. The
    /// resulting broadcast carries no new acknowledgment.
    pub fn dispatch(&self, action: A) {
        self.host.enqueue(Inbound::Local(action));
    }

    /// Clone of the authoritative state
    pub fn state(&self) -> S {
        self.host.authority.borrow().state.clone()
    }

    /// Read the authoritative state without cloning
    pub fn with_state<R>(&self, read: impl FnOnce(&S) -> R) -> R {
        read(&self.host.authority.borrow().state)
    }

    /// Version of the latest broadcast (`Version::ZERO` before the first)
    pub fn version(&self) -> Version {
        self.host.authority.borrow().version
    }

    /// Id of the most recently settled client action
    pub fn last_ack(&self) -> Option<ActionId> {
        self.host.authority.borrow().last_ack
    }

    /// Channel names this adapter serves
    pub fn channels(&self) -> &ChannelSet {
        &self.host.channels
    }

    /// Active configuration
    pub fn config(&self) -> &HostConfig {
        &self.host.config
    }

    /// Observe transition failures and rejected payloads
    pub fn on_diagnostic(&self, hook: impl Fn(&Diagnostic) + 'static) {
        self.host.diagnostics.set_hook(hook);
    }

    /// Stop serving the instance
    pub fn detach(self) {
        drop(self);
    }
}

impl<S, A> Drop for Adapter<S, A> {
    fn drop(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        debug!(instance = self.host.channels.instance(), "adapter detached");
    }
}
