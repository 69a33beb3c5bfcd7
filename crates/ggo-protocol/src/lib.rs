//! Protocol types shared between the Green-GO bridge and its hosts.
//!
//! Two protocols meet in this crate:
//!
//! - **Device protocol** (bridge ↔ intercom): OSC over UDP. The device pushes
//!   `/ggo/state/...` messages and accepts `/ggo/cmd/<name>` commands. See
//!   [`osc`] for the message model and datagram codec.
//! - **Host protocol** (bridge ↔ control surface): JSON Lines over stdio.
//!   The bridge emits [`HostEvent`]s and reads [`HostCommand`]s.
//!
//! # Example: Host adapter
//!
//! ```ignore
//! use ggo_protocol::{HostCommand, HostEvent};
//!
//! // Read events from the bridge's stdout
//! let line = read_line_from_bridge();
//! let event: HostEvent = serde_json::from_str(&line)?;
//!
//! // Ask the bridge to send a command to the device
//! let command = HostCommand::SendCommand {
//!     name: "mute".to_string(),
//!     values: vec![1, 3],
//! };
//! println!("{}", serde_json::to_string(&command)?);
//! ```

pub mod osc;
mod value;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use osc::{Arg, Message, ProtocolError, decode, encode};
pub use value::Value;

/// Fixed OSC addresses used by the device.
pub mod address {
    /// Liveness signal pushed by the device.
    pub const HEARTBEAT: &str = "/ggo/state/heartbeat";
    /// Sent by the device once a full state push has completed.
    pub const STATE_UPDATED: &str = "/ggo/state/updated";
    /// Prefix of every state message.
    pub const STATE_PREFIX: &str = "/ggo/state/";
    /// Prefix of every command sent to the device.
    pub const COMMAND_PREFIX: &str = "/ggo/cmd/";
    /// Command name that asks the device for a full state push.
    pub const UPDATE_COMMAND: &str = "update";
}

// ============================================================================
// Events (Bridge → Host)
// ============================================================================

/// Events sent from the bridge to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// A batch of variables whose values changed.
    Variables {
        values: BTreeMap<String, Value>,
        timestamp: DateTime<Utc>,
    },

    /// Display logic depending on variables should be re-evaluated.
    CheckFeedbacks,

    /// Connection status changed.
    Status {
        status: InstanceStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

/// Status reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Ok,
    Disconnected,
    BadConfig,
    ConnectionFailure,
}

// ============================================================================
// Commands (Host → Bridge)
// ============================================================================

/// Commands sent from the host to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostCommand {
    /// Send `/ggo/cmd/<name>` with integer arguments.
    SendCommand { name: String, values: Vec<i32> },

    /// Ask the device for a full state push.
    RequestSync,

    /// Close and reopen the device session.
    Restart,

    /// Close the device session without stopping the bridge.
    Close,

    /// Stop the bridge.
    Shutdown,
}
