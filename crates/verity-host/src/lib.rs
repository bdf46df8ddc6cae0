//! Verity Host - The authoritative adapter
//!
//! The host process owns exactly one writer of record per state instance:
//!
//! ```text
//! <instance>:action ───┐
//!                      ├──▶ Adapter ──transition──▶ state'
//! <instance>:snapshot ─┘       │
//!                              └──▶ { value: state', version: n+1, ackId } ──▶ <instance>:state
//! ```
//!
//! ## Design Principles
//!
//! 1. **Single writer** - only the adapter mutates the state or its version
//! 2. **Sequential** - one inbound item at a time, in receipt order
//! 3. **Reactive only** - broadcasts answer actions and snapshot requests,
//!    never anything else
//! 4. **Settled failures** - a rejected action is still acknowledged (see
//!    [`FailurePolicy`])

mod adapter;
mod config;

pub use adapter::{Adapter, TransitionFn};
pub use config::{FailurePolicy, HostConfig};
