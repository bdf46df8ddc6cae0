//! Reconciliation against authoritative broadcasts
//!
//! [`Reconciler`] is the transport-free core of the client: it tracks the
//! confirmed state, the highest accepted version and the pending queue, and
//! projects the visible state by folding a prediction function over the
//! pending actions.

use crate::{Error, PendingQueue, Result};
use tracing::trace;
use verity_core::{ActionEnvelope, ActionId, Broadcast, PredictionError, Version};

/// Boxed client prediction function
pub type PredictFn<S, A> = Box<dyn Fn(&S, &A) -> std::result::Result<S, PredictionError>>;

/// What happened to an incoming broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Version not above the highest accepted; nothing changed
    Stale { version: Version, highest: Version },
    /// Broadcast became the confirmed state
    Accepted {
        version: Version,
        /// Pending entries retired by its acknowledgment
        retired: usize,
        /// Whether this was the first broadcast ever accepted
        first: bool,
    },
}

/// Confirmed state, pending queue and version tracking for one client
#[derive(Debug, Clone)]
pub struct Reconciler<S, A> {
    confirmed: S,
    highest: Option<Version>,
    pending: PendingQueue<A>,
    next_id: ActionId,
}

impl<S, A> Reconciler<S, A> {
    /// Last accepted authoritative value (or the initial state)
    pub fn confirmed(&self) -> &S {
        &self.confirmed
    }

    /// Highest accepted version
    pub fn highest(&self) -> Option<Version> {
        self.highest
    }

    /// The pending queue
    pub fn pending(&self) -> &PendingQueue<A> {
        &self.pending
    }

    /// The id the next issued action will get
    pub fn next_id(&self) -> ActionId {
        self.next_id
    }
}

impl<S: Clone, A> Reconciler<S, A> {
    /// Start from `initial` with room for `max_pending` unacknowledged actions
    pub fn new(initial: S, max_pending: usize) -> Self {
        Self {
            confirmed: initial,
            highest: None,
            pending: PendingQueue::new(max_pending),
            next_id: ActionId::FIRST,
        }
    }

    /// Check that another action fits, returning the id it would get
    pub fn reserve(&self) -> Result<ActionId> {
        if self.pending.is_full() {
            return Err(Error::PendingQueueFull {
                capacity: self.pending.capacity(),
            });
        }
        Ok(self.next_id)
    }

    /// Issue `action` under the next id
    pub fn issue(&mut self, action: A) -> Result<ActionId> {
        let id = self.reserve()?;
        self.pending.push(ActionEnvelope::new(id, action))?;
        self.next_id = id.next();
        Ok(id)
    }

    /// Apply an incoming broadcast
    ///
    /// Broadcasts at or below the highest accepted version are discarded
    /// without side effects. Otherwise the value becomes the confirmed
    /// state and the acknowledgment (if any) retires pending entries
    /// cumulatively.
    pub fn accept(&mut self, broadcast: Broadcast<S>) -> Outcome {
        if let Some(highest) = self.highest {
            if broadcast.version <= highest {
                return Outcome::Stale {
                    version: broadcast.version,
                    highest,
                };
            }
        }

        let first = self.highest.is_none();
        self.confirmed = broadcast.value;
        self.highest = Some(broadcast.version);
        let retired = broadcast
            .ack_id
            .map_or(0, |ack| self.pending.acknowledge(ack));

        trace!(
            version = %broadcast.version,
            ack_id = ?broadcast.ack_id,
            retired,
            pending = self.pending.len(),
            "accepted broadcast"
        );
        Outcome::Accepted {
            version: broadcast.version,
            retired,
            first,
        }
    }

    /// Fold `predict` over the pending queue, starting from confirmed state
    ///
    /// On failure, reports which pending action the prediction choked on.
    /// Confirmed state and the queue are never touched.
    pub fn project_with<P>(&self, predict: P) -> Result<S>
    where
        P: Fn(&S, &A) -> std::result::Result<S, PredictionError>,
    {
        self.pending
            .iter()
            .try_fold(self.confirmed.clone(), |state, entry| {
                predict(&state, &entry.action).map_err(|source| Error::Prediction {
                    action_id: entry.id,
                    source,
                })
            })
    }
}
