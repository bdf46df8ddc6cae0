//! Channel naming for a synchronized state instance
//!
//! Every instance owns three channels, named `<instance><suffix>`:
//! - `:state` carries versioned broadcasts (retained by the relay)
//! - `:action` carries inbound action envelopes
//! - `:snapshot` carries snapshot requests

use serde::{Deserialize, Serialize};

/// The role a channel plays for its instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Host-to-client versioned broadcasts
    State,
    /// Client-to-host action envelopes
    Action,
    /// Client-to-host snapshot requests
    Snapshot,
}

impl Role {
    /// Every role, in a stable order
    pub const ALL: [Role; 3] = [Role::State, Role::Action, Role::Snapshot];

    /// Naming suffix for this role
    pub fn suffix(self) -> &'static str {
        match self {
            Role::State => ":state",
            Role::Action => ":action",
            Role::Snapshot => ":snapshot",
        }
    }

    /// Recover the role from a channel name
    pub fn of(channel: &str) -> Option<Role> {
        Role::ALL
            .into_iter()
            .find(|role| channel.ends_with(role.suffix()))
    }
}

/// The channel names used by one state instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelSet {
    instance: String,
    state: String,
    action: String,
    snapshot: String,
}

impl ChannelSet {
    /// Derive the channel names for `instance`
    pub fn new(instance: impl Into<String>) -> Self {
        let instance = instance.into();
        Self {
            state: format!("{instance}{}", Role::State.suffix()),
            action: format!("{instance}{}", Role::Action.suffix()),
            snapshot: format!("{instance}{}", Role::Snapshot.suffix()),
            instance,
        }
    }

    /// The instance identifier
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Broadcast channel
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Inbound action channel
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Snapshot-request channel
    pub fn snapshot(&self) -> &str {
        &self.snapshot
    }

    /// Channel name for a role
    pub fn channel(&self, role: Role) -> &str {
        match role {
            Role::State => &self.state,
            Role::Action => &self.action,
            Role::Snapshot => &self.snapshot,
        }
    }
}
