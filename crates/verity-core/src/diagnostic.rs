//! Diagnostics for failure paths that never surface as errors
//!
//! Stale broadcasts, prediction failures, rejected payloads and failed
//! transitions all degrade to "stay on last-known-good state". They are
//! logged through `tracing` and forwarded to an optional hook so tests and
//! hosts can observe them.

use crate::{ActionId, Version};
use std::cell::RefCell;
use std::rc::Rc;

/// Something the protocol absorbed instead of failing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A broadcast whose version was not above the highest accepted one
    StaleBroadcast {
        channel: String,
        version: Version,
        highest: Version,
    },
    /// The prediction function failed while folding a pending action
    PredictionFailure { action_id: ActionId, reason: String },
    /// A payload was rejected at the transport boundary
    TransportFailure { channel: String, reason: String },
    /// The host transition function failed
    TransitionFailure {
        action_id: Option<ActionId>,
        reason: String,
    },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::StaleBroadcast {
                channel,
                version,
                highest,
            } => write!(f, "stale broadcast {version} on {channel} (highest {highest})"),
            Diagnostic::PredictionFailure { action_id, reason } => {
                write!(f, "prediction failed at action {action_id}: {reason}")
            }
            Diagnostic::TransportFailure { channel, reason } => {
                write!(f, "rejected payload on {channel}: {reason}")
            }
            Diagnostic::TransitionFailure { action_id, reason } => match action_id {
                Some(id) => write!(f, "transition failed for action {id}: {reason}"),
                None => write!(f, "transition failed for host action: {reason}"),
            },
        }
    }
}

/// Shared diagnostic callback
pub type DiagnosticHook = Rc<dyn Fn(&Diagnostic)>;

/// Diagnostic reporter with an optional hook
#[derive(Clone, Default)]
pub struct Diagnostics {
    hook: Rc<RefCell<Option<DiagnosticHook>>>,
}

impl Diagnostics {
    /// Create a reporter that only logs
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the hook
    pub fn set_hook(&self, hook: impl Fn(&Diagnostic) + 'static) {
        *self.hook.borrow_mut() = Some(Rc::new(hook));
    }

    /// Remove the hook
    pub fn clear_hook(&self) {
        self.hook.borrow_mut().take();
    }

    /// Log `diagnostic` and forward it to the hook
    pub fn report(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::StaleBroadcast { .. } => tracing::debug!(%diagnostic, "discarded"),
            _ => tracing::warn!(%diagnostic, "degraded to last-known-good state"),
        }

        // Clone out so the hook may reinstall itself
        let hook = self.hook.borrow().clone();
        if let Some(hook) = hook {
            hook(&diagnostic);
        }
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("hooked", &self.hook.borrow().is_some())
            .finish()
    }
}
