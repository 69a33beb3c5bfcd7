//! Bridge actor command protocol and configuration.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::config::{EndpointConfig, TimingConfig};
use crate::error::BridgeError;
use crate::host::Host;
use crate::liveness::LivenessSnapshot;
use crate::registry::{Variable, VariableRegistry};
use crate::transport::Connector;

/// Capacity of the actor's command channel.
pub const CHANNEL_CAPACITY: usize = 64;

/// Capacity of the per-session transport event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ============================================================================
// Bridge Command
// ============================================================================

/// Commands that can be sent to the bridge actor.
pub enum BridgeCommand {
    // Session lifecycle
    Init {
        endpoint: EndpointConfig,
        reply: oneshot::Sender<Result<(), BridgeError>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
    Destroy {
        reply: oneshot::Sender<()>,
    },

    // Device operations
    SendCommand {
        name: String,
        values: Vec<i32>,
        reply: oneshot::Sender<Result<(), BridgeError>>,
    },
    RequestSync {
        reply: oneshot::Sender<()>,
    },

    // Read operations
    IsOpen {
        reply: oneshot::Sender<bool>,
    },
    GetVariables {
        reply: oneshot::Sender<Vec<Variable>>,
    },
    GetVariable {
        key: String,
        reply: oneshot::Sender<Option<Variable>>,
    },
    GetLiveness {
        reply: oneshot::Sender<LivenessSnapshot>,
    },
}

// ============================================================================
// Actor Configuration
// ============================================================================

/// Everything the actor owns for its lifetime.
pub struct ActorConfig {
    pub registry: VariableRegistry,
    pub host: Arc<dyn Host>,
    pub connector: Arc<dyn Connector>,
    pub timing: TimingConfig,
}

// ============================================================================
// Command Arguments
// ============================================================================

/// Integer arguments of a device command, from a scalar or a list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs(pub Vec<i32>);

impl From<i32> for CommandArgs {
    fn from(value: i32) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<i32>> for CommandArgs {
    fn from(values: Vec<i32>) -> Self {
        Self(values)
    }
}

impl From<&[i32]> for CommandArgs {
    fn from(values: &[i32]) -> Self {
        Self(values.to_vec())
    }
}

impl<const N: usize> From<[i32; N]> for CommandArgs {
    fn from(values: [i32; N]) -> Self {
        Self(values.to_vec())
    }
}
