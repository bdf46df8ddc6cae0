//! Verity Core - Shared vocabulary for host-authoritative state sync
//!
//! This crate holds everything the relay, the host adapter and the sync
//! client agree on:
//! - Wire payloads (`Broadcast`, `ActionEnvelope`) and their identifiers
//! - Channel naming (`ChannelSet`) for one synchronized state instance
//! - The `Transport` seam (publish/subscribe) and `Subscription` handles
//! - Framework-agnostic reactive cells (`ReadCell`, `Watchers`, `ValueCell`)
//! - Diagnostics for the silent failure paths (stale, prediction, transport)
//!
//! # Data flow
//!
//! ```text
//!  Client ──send──▶ {action,id} ──▶ <instance>:action ──▶ Adapter
//!    ▲                                                      │
//!    └── {value,version,ackId} ◀── <instance>:state ◀───────┘
//! ```
//!
//! All payloads cross the transport as `serde_json::Value` and are decoded
//! at the boundary with [`decode`]; malformed payloads never reach the
//! reconciliation logic.

mod cell;
mod channel;
mod diagnostic;
mod error;
mod id;
mod transport;
mod wire;

pub use cell::{ReadCell, ValueCell, Watchers};
pub use channel::{ChannelSet, Role};
pub use diagnostic::{Diagnostic, DiagnosticHook, Diagnostics};
pub use error::{Error, PredictionError, Result, TransitionError};
pub use id::{ActionId, Version};
pub use transport::{Handler, Subscription, Transport};
pub use wire::{decode, encode, ActionEnvelope, Broadcast};

// Payloads are plain JSON values on the wire
pub use serde_json::Value;
