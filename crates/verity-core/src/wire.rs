//! Wire payloads and the JSON boundary
//!
//! Both shapes serialize to exactly the fields the protocol names:
//! `{ value, version, ackId? }` and `{ action, id }`.

use crate::{ActionId, Error, Result, Version};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A versioned state broadcast from the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Broadcast<S> {
    /// The authoritative state at this version
    pub value: S,
    /// Host-assigned version, strictly increasing per channel
    pub version: Version,
    /// The action (from some client) whose effect this broadcast reflects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_id: Option<ActionId>,
}

impl<S> Broadcast<S> {
    /// Create a broadcast without an acknowledgment
    pub fn new(value: S, version: Version) -> Self {
        Self {
            value,
            version,
            ack_id: None,
        }
    }

    /// Tag the broadcast with an acknowledged action id
    pub fn with_ack(mut self, ack_id: impl Into<Option<ActionId>>) -> Self {
        self.ack_id = ack_id.into();
        self
    }
}

/// An action as published by the issuing client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEnvelope<A> {
    /// The action itself
    pub action: A,
    /// Client-assigned sequence id
    pub id: ActionId,
}

impl<A> ActionEnvelope<A> {
    /// Wrap an action with its id
    pub fn new(id: ActionId, action: A) -> Self {
        Self { action, id }
    }
}

/// Encode a payload for publishing
pub fn encode<T: Serialize>(payload: &T) -> Result<Value> {
    serde_json::to_value(payload).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a payload received on `channel`
///
/// Anything that does not match `T` is rejected as a malformed payload.
pub fn decode<T: DeserializeOwned>(channel: &str, payload: &Value) -> Result<T> {
    T::deserialize(payload).map_err(|e| Error::MalformedPayload {
        channel: channel.to_string(),
        reason: e.to_string(),
    })
}
