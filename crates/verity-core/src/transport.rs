//! Transport seam for publish/subscribe delivery
//!
//! The sync protocol only needs a publish/subscribe capability. Implement
//! [`Transport`] for whatever carries messages between host and clients
//! (an in-process relay, a window bridge, a socket).

use serde_json::Value;
use std::rc::Rc;

/// A boxed subscriber callback
pub type Handler = Box<dyn Fn(&Value)>;

/// Publish/subscribe transport
///
/// Delivery must be reliable and ordered per channel.
pub trait Transport {
    /// Publish `payload` to every subscriber of `channel`
    fn publish(&self, channel: &str, payload: Value);

    /// Attach `handler` to `channel`
    ///
    /// The returned [`Subscription`] removes exactly this handler.
    fn subscribe(&self, channel: &str, handler: Handler) -> Subscription;
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
    fn publish(&self, channel: &str, payload: Value) {
        (**self).publish(channel, payload)
    }

    fn subscribe(&self, channel: &str, handler: Handler) -> Subscription {
        (**self).subscribe(channel, handler)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn publish(&self, channel: &str, payload: Value) {
        (**self).publish(channel, payload)
    }

    fn subscribe(&self, channel: &str, handler: Handler) -> Subscription {
        (**self).subscribe(channel, handler)
    }
}

/// Handle for an attached handler
///
/// Call [`Subscription::unsubscribe`] to detach. Dropping the handle without
/// unsubscribing leaves the handler attached.
#[must_use = "dropping a Subscription leaves the handler attached"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Create a subscription that runs `cancel` on unsubscribe
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to cancel
    pub fn inert() -> Self {
        Self { cancel: None }
    }

    /// Whether unsubscribing would still detach something
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// Detach the handler
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
