//! Verity Client - Optimistic view of host-authoritative state
//!
//! A client keeps three things for one state instance:
//!
//! - **Confirmed state**: the last broadcast accepted from the host
//! - **Pending queue**: actions it issued that the host has not acknowledged
//! - **Visible state**: confirmed state with the predictor folded over the
//!   pending queue (recomputed on demand)
//!
//! ```text
//!  send(action) ──▶ PendingQueue ──▶ <instance>:action ──▶ host
//!                        │
//!  <instance>:state ──▶ Reconciler ── version > highest? ──▶ confirmed
//!                        │                                     │
//!                        └── retire ids <= ackId               ▼
//!                                               visible = fold(predict, confirmed, pending)
//! ```
//!
//! The version carried by each broadcast is the only ordering the client
//! trusts; anything at or below the highest accepted version is dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! let client = SyncClient::builder(ChannelSet::new("board"), Board::default())
//!     .predictor(|board: &Board, mv: &Move| Ok(board.preview(mv)))
//!     .on_diagnostic(|d| eprintln!("{d}"))
//!     .attach(relay.clone())?;
//!
//! client.send(Move::new(3, 4))?;
//! render(&client.visible());
//! ```

mod client;
mod config;
mod error;
mod pending;
mod reconciliation;

#[cfg(test)]
mod scenarios;

pub use client::{ConnectedCell, PendingCell, SyncClient, SyncClientBuilder, VisibleCell};
pub use config::{ClientConfig, DEFAULT_MAX_PENDING};
pub use error::{Error, Result};
pub use pending::PendingQueue;
pub use reconciliation::{Outcome, PredictFn, Reconciler};
