//! SyncClient - the transport-facing side of a client session
//!
//! Wires a [`Reconciler`] to a [`Transport`]: decodes broadcasts at the
//! boundary, publishes action envelopes, and exposes the
//! `(visible, connected, pending)` triple as read-only cells.

use crate::config::ClientConfig;
use crate::reconciliation::{Outcome, PredictFn, Reconciler};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, trace};
use verity_core::{
    decode, encode, ActionEnvelope, ActionId, Broadcast, ChannelSet, Diagnostic, Diagnostics,
    PredictionError, ReadCell, Subscription, Transport, Value, Version, Watchers,
};

/// Shared state of one attached client
struct Session<S, A> {
    channels: ChannelSet,
    config: ClientConfig,
    transport: Box<dyn Transport>,
    predictor: Option<PredictFn<S, A>>,
    diagnostics: Diagnostics,
    reconciler: RefCell<Reconciler<S, A>>,
    connected: Cell<bool>,
    visible_watchers: Watchers<S>,
    connected_watchers: Watchers<bool>,
    pending_watchers: Watchers<usize>,
}

impl<S, A> Session<S, A>
where
    S: Clone + DeserializeOwned + 'static,
    A: Serialize + 'static,
{
    fn receive(&self, payload: &Value) {
        let channel = self.channels.state();
        let broadcast = match decode::<Broadcast<S>>(channel, payload) {
            Ok(broadcast) => broadcast,
            Err(err) => {
                self.diagnostics.report(Diagnostic::TransportFailure {
                    channel: channel.to_string(),
                    reason: err.to_string(),
                });
                return;
            }
        };

        let outcome = self.reconciler.borrow_mut().accept(broadcast);
        match outcome {
            Outcome::Stale { version, highest } => {
                self.diagnostics.report(Diagnostic::StaleBroadcast {
                    channel: channel.to_string(),
                    version,
                    highest,
                });
            }
            Outcome::Accepted {
                version,
                retired,
                first,
            } => {
                let pending = self.pending_count();
                debug!(channel, %version, retired, pending, "confirmed");
                if retired > 0 {
                    self.pending_watchers.notify(&pending);
                }
                if first && !self.connected.replace(true) {
                    debug!(channel, "connected");
                    self.connected_watchers.notify(&true);
                }
                self.publish_visible();
            }
        }
    }

    fn send(&self, action: A) -> Result<ActionId> {
        let id = self.reconciler.borrow().reserve()?;
        let payload = encode(&ActionEnvelope::new(id, &action))?;
        let id = self.reconciler.borrow_mut().issue(action)?;

        // The envelope leaves before any watcher can issue the next id
        trace!(channel = self.channels.action(), %id, "send");
        self.transport.publish(self.channels.action(), payload);

        let pending = self.pending_count();
        self.pending_watchers.notify(&pending);
        self.publish_visible();
        Ok(id)
    }

    fn request_snapshot(&self) {
        trace!(channel = self.channels.snapshot(), "snapshot request");
        self.transport.publish(self.channels.snapshot(), Value::Null);
    }

    fn try_visible(&self) -> Result<S> {
        let reconciler = self.reconciler.borrow();
        match &self.predictor {
            Some(predict) => reconciler.project_with(|state: &S, action: &A| predict(state, action)),
            None => Ok(reconciler.confirmed().clone()),
        }
    }

    fn visible(&self) -> S {
        match self.try_visible() {
            Ok(state) => state,
            Err(err) => {
                if let Error::Prediction { action_id, source } = &err {
                    self.diagnostics.report(Diagnostic::PredictionFailure {
                        action_id: *action_id,
                        reason: source.to_string(),
                    });
                }
                self.reconciler.borrow().confirmed().clone()
            }
        }
    }

    fn publish_visible(&self) {
        if !self.visible_watchers.is_empty() {
            let visible = self.visible();
            self.visible_watchers.notify(&visible);
        }
    }

    fn pending_count(&self) -> usize {
        self.reconciler.borrow().pending().len()
    }
}

/// Builder for a [`SyncClient`]
pub struct SyncClientBuilder<S, A> {
    channels: ChannelSet,
    initial: S,
    config: ClientConfig,
    predictor: Option<PredictFn<S, A>>,
    diagnostics: Diagnostics,
}

impl<S, A> SyncClientBuilder<S, A>
where
    S: Clone + DeserializeOwned + 'static,
    A: Serialize + 'static,
{
    /// Use a specific configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Predict the effect of pending actions on the visible state
    pub fn predictor<P>(mut self, predict: P) -> Self
    where
        P: Fn(&S, &A) -> std::result::Result<S, PredictionError> + 'static,
    {
        self.predictor = Some(Box::new(predict));
        self
    }

    /// Observe stale broadcasts, prediction failures and rejected payloads
    pub fn on_diagnostic(self, hook: impl Fn(&Diagnostic) + 'static) -> Self {
        self.diagnostics.set_hook(hook);
        self
    }

    /// Subscribe to the state channel and start the session
    ///
    /// A retained broadcast, if any, is applied before this returns. With
    /// `snapshot_on_attach`, a snapshot is requested when none was.
    pub fn attach<T: Transport + 'static>(self, transport: T) -> Result<SyncClient<S, A>> {
        let SyncClientBuilder {
            channels,
            initial,
            config,
            predictor,
            diagnostics,
        } = self;
        config.validate()?;

        let session = Rc::new(Session {
            reconciler: RefCell::new(Reconciler::new(initial, config.max_pending)),
            channels,
            config,
            transport: Box::new(transport),
            predictor,
            diagnostics,
            connected: Cell::new(false),
            visible_watchers: Watchers::new(),
            connected_watchers: Watchers::new(),
            pending_watchers: Watchers::new(),
        });

        let weak = Rc::downgrade(&session);
        let subscription = session.transport.subscribe(
            session.channels.state(),
            Box::new(move |payload: &Value| {
                if let Some(session) = weak.upgrade() {
                    session.receive(payload);
                }
            }),
        );

        debug!(
            instance = session.channels.instance(),
            connected = session.connected.get(),
            "client attached"
        );
        if session.config.snapshot_on_attach && !session.connected.get() {
            session.request_snapshot();
        }

        Ok(SyncClient {
            session,
            subscription: Some(subscription),
        })
    }
}

/// Client session with optimistic prediction
///
/// Keeps the last confirmed state from the host, the queue of actions it
/// issued that the host has not acknowledged yet, and projects the visible
/// state by replaying those actions through the predictor.
///
/// ```
/// use verity_client::{ClientConfig, SyncClient};
/// use verity_core::ChannelSet;
/// use verity_relay::Relay;
///
/// let relay = Relay::new();
/// let client = SyncClient::<i64, i64>::builder(ChannelSet::new("total"), 0)
///     .config(ClientConfig::default().with_snapshot_on_attach(false))
///     .predictor(|total: &i64, delta: &i64| Ok(total + delta))
///     .attach(relay.clone())
///     .unwrap();
///
/// client.send(5).unwrap();
/// assert_eq!(client.visible(), 5);
/// assert_eq!(client.confirmed(), 0);
///
/// relay.publish("total:state", serde_json::json!({ "value": 5, "version": 1, "ackId": 1 }));
/// assert_eq!(client.pending_count(), 0);
/// assert!(client.is_connected());
/// ```
pub struct SyncClient<S, A> {
    session: Rc<Session<S, A>>,
    subscription: Option<Subscription>,
}

impl<S, A> SyncClient<S, A>
where
    S: Clone + DeserializeOwned + 'static,
    A: Serialize + 'static,
{
    /// Start building a client for `channels`, seeded with `initial`
    pub fn builder(channels: ChannelSet, initial: S) -> SyncClientBuilder<S, A> {
        SyncClientBuilder {
            channels,
            initial,
            config: ClientConfig::default(),
            predictor: None,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Attach a client with no predictor and the default configuration
    pub fn attach<T: Transport + 'static>(
        transport: T,
        channels: ChannelSet,
        initial: S,
    ) -> Result<Self> {
        Self::builder(channels, initial).attach(transport)
    }

    /// Issue an action
    ///
    /// The action is queued as pending and published to the host. The
    /// visible state includes its prediction as soon as this returns.
    pub fn send(&self, action: A) -> Result<ActionId> {
        self.session.send(action)
    }

    /// Ask the host to broadcast its current state
    pub fn request_snapshot(&self) {
        self.session.request_snapshot();
    }

    /// Visible state, falling back to confirmed state if prediction fails
    pub fn visible(&self) -> S {
        self.session.visible()
    }

    /// Visible state, surfacing prediction failures
    pub fn try_visible(&self) -> Result<S> {
        self.session.try_visible()
    }

    /// Last confirmed state
    pub fn confirmed(&self) -> S {
        self.session.reconciler.borrow().confirmed().clone()
    }

    /// Whether any broadcast has been accepted
    pub fn is_connected(&self) -> bool {
        self.session.connected.get()
    }

    /// Number of unacknowledged actions
    pub fn pending_count(&self) -> usize {
        self.session.pending_count()
    }

    /// Ids of unacknowledged actions, oldest first
    pub fn pending_ids(&self) -> Vec<ActionId> {
        self.session.reconciler.borrow().pending().ids()
    }

    /// Highest accepted broadcast version
    pub fn version(&self) -> Option<Version> {
        self.session.reconciler.borrow().highest()
    }

    /// Id the next [`SyncClient::send`] will use
    pub fn next_id(&self) -> ActionId {
        self.session.reconciler.borrow().next_id()
    }

    /// Channel names of the instance
    pub fn channels(&self) -> &ChannelSet {
        &self.session.channels
    }

    /// Active configuration
    pub fn config(&self) -> &ClientConfig {
        &self.session.config
    }

    /// Observable visible state
    pub fn visible_cell(&self) -> VisibleCell<S, A> {
        VisibleCell {
            session: Rc::clone(&self.session),
        }
    }

    /// Observable connected flag
    pub fn connected_cell(&self) -> ConnectedCell<S, A> {
        ConnectedCell {
            session: Rc::clone(&self.session),
        }
    }

    /// Observable pending count
    pub fn pending_cell(&self) -> PendingCell<S, A> {
        PendingCell {
            session: Rc::clone(&self.session),
        }
    }

    /// Stop receiving broadcasts and end the session
    pub fn detach(self) {
        drop(self);
    }
}

impl<S, A> Drop for SyncClient<S, A> {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            debug!(instance = self.session.channels.instance(), "client detached");
        }
    }
}

/// Read-only cell over a client's visible state
pub struct VisibleCell<S, A> {
    session: Rc<Session<S, A>>,
}

impl<S, A> ReadCell for VisibleCell<S, A>
where
    S: Clone + DeserializeOwned + 'static,
    A: Serialize + 'static,
{
    type Value = S;

    fn get(&self) -> S {
        self.session.visible()
    }

    fn watch(&self, observer: Box<dyn Fn(&S)>) -> Subscription {
        self.session.visible_watchers.watch(observer)
    }
}

/// Read-only cell over a client's connected flag
pub struct ConnectedCell<S, A> {
    session: Rc<Session<S, A>>,
}

impl<S, A> ReadCell for ConnectedCell<S, A> {
    type Value = bool;

    fn get(&self) -> bool {
        self.session.connected.get()
    }

    fn watch(&self, observer: Box<dyn Fn(&bool)>) -> Subscription {
        self.session.connected_watchers.watch(observer)
    }
}

/// Read-only cell over a client's pending count
pub struct PendingCell<S, A> {
    session: Rc<Session<S, A>>,
}

impl<S, A> ReadCell for PendingCell<S, A> {
    type Value = usize;

    fn get(&self) -> usize {
        self.session.reconciler.borrow().pending().len()
    }

    fn watch(&self, observer: Box<dyn Fn(&usize)>) -> Subscription {
        self.session.pending_watchers.watch(observer)
    }
}
