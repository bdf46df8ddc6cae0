//! Pending action queue
//!
//! Holds actions that have been published to the host but not yet
//! acknowledged. Entries are kept in issuance order and retired
//! cumulatively: acknowledging id N retires every entry with id <= N.

use std::collections::VecDeque;
use verity_core::{ActionEnvelope, ActionId};

/// Queue of unacknowledged actions, oldest first
#[derive(Debug, Clone)]
pub struct PendingQueue<A> {
    entries: VecDeque<ActionEnvelope<A>>,
    capacity: usize,
}

impl<A> PendingQueue<A> {
    /// Create a queue bounded to `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Append an envelope
    ///
    /// Returns `Err` if the queue is full. Ids must be pushed in increasing
    /// order; the client's counter guarantees this.
    pub fn push(&mut self, envelope: ActionEnvelope<A>) -> crate::Result<()> {
        if self.is_full() {
            return Err(crate::Error::PendingQueueFull {
                capacity: self.capacity,
            });
        }
        debug_assert!(self.newest_id().map_or(true, |newest| envelope.id > newest));
        self.entries.push_back(envelope);
        Ok(())
    }

    /// Retire every entry with id <= `ack`
    ///
    /// Returns the number of entries retired.
    pub fn acknowledge(&mut self, ack: ActionId) -> usize {
        let mut retired = 0;
        while let Some(front) = self.entries.front() {
            if front.id <= ack {
                self.entries.pop_front();
                retired += 1;
            } else {
                break;
            }
        }
        retired
    }

    /// Iterate in issuance order
    pub fn iter(&self) -> impl Iterator<Item = &ActionEnvelope<A>> {
        self.entries.iter()
    }

    /// Ids in issuance order
    pub fn ids(&self) -> Vec<ActionId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    /// Newest unacknowledged id
    pub fn newest_id(&self) -> Option<ActionId> {
        self.entries.back().map(|e| e.id)
    }

    /// Number of pending entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether another push would be rejected
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
