//! Verity Relay - In-memory pub/sub hub
//!
//! The relay sits between the host adapter and its clients:
//!
//! ```text
//! Adapter ──publish──▶ Relay ──▶ handler (client A)
//!                        │  ──▶ handler (client B)
//!                        └── retained value per :state channel
//!                              └──▶ replayed to late subscribers
//! ```
//!
//! ## Key Properties
//!
//! 1. **Synchronous** - `publish` and `subscribe` run to completion
//! 2. **Ordered** - handlers run in attachment order, per publish
//! 3. **Isolated** - a panicking handler never blocks the others
//! 4. **Explicit** - a relay is a constructed handle, never global state
//!
//! [`Relay`] implements [`verity_core::Transport`], so hosts and clients
//! can be wired to it directly or to any other transport. [`DelayedLink`]
//! puts a flush-controlled hop in front of a relay to simulate latency.

mod config;
mod delayed;
mod relay;

pub use config::RelayConfig;
pub use delayed::DelayedLink;
pub use relay::Relay;
