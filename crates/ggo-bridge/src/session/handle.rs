//! Handle for communicating with the bridge actor.
//!
//! `BridgeHandle` wraps the actor's command sender and is cheap to clone.
//! Every method is a round trip through the actor, so calls from one handle
//! are observed in order.

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::config::EndpointConfig;
use crate::error::BridgeError;
use crate::liveness::LivenessSnapshot;
use crate::registry::{Variable, VariableUpdate};

use super::actor_types::{BridgeCommand, CommandArgs};

#[derive(Clone)]
pub struct BridgeHandle {
    tx: mpsc::Sender<BridgeCommand>,
    updates: broadcast::Sender<VariableUpdate>,
}

impl BridgeHandle {
    pub(crate) fn new(
        tx: mpsc::Sender<BridgeCommand>,
        updates: broadcast::Sender<VariableUpdate>,
    ) -> Self {
        Self { tx, updates }
    }

    // ------------------------------------------------------------------------
    // Session Lifecycle
    // ------------------------------------------------------------------------

    /// Open a device session, closing any session that is already open.
    ///
    /// An endpoint without host or port is rejected before the current
    /// session is touched.
    pub async fn init(&self, endpoint: EndpointConfig) -> Result<(), BridgeError> {
        self.request(|reply| BridgeCommand::Init { endpoint, reply })
            .await?
    }

    /// Close the device session. No-op when nothing is open.
    pub async fn close(&self) -> Result<(), BridgeError> {
        self.request(|reply| BridgeCommand::Close { reply }).await
    }

    /// Close the device session and stop the actor.
    pub async fn destroy(&self) -> Result<(), BridgeError> {
        self.request(|reply| BridgeCommand::Destroy { reply }).await
    }

    // ------------------------------------------------------------------------
    // Device Operations
    // ------------------------------------------------------------------------

    /// Send `/ggo/cmd/<name>` with one integer argument per value.
    pub async fn send_command(
        &self,
        name: impl Into<String>,
        values: impl Into<CommandArgs>,
    ) -> Result<(), BridgeError> {
        let name = name.into();
        let CommandArgs(values) = values.into();
        self.request(|reply| BridgeCommand::SendCommand {
            name,
            values,
            reply,
        })
        .await?
    }

    /// Ask the device for a full state push, repeating until it confirms.
    pub async fn request_sync(&self) -> Result<(), BridgeError> {
        self.request(|reply| BridgeCommand::RequestSync { reply })
            .await
    }

    // ------------------------------------------------------------------------
    // Read Operations
    // ------------------------------------------------------------------------

    pub async fn is_open(&self) -> Result<bool, BridgeError> {
        self.request(|reply| BridgeCommand::IsOpen { reply }).await
    }

    pub async fn variables(&self) -> Result<Vec<Variable>, BridgeError> {
        self.request(|reply| BridgeCommand::GetVariables { reply })
            .await
    }

    pub async fn variable(&self, key: impl Into<String>) -> Result<Option<Variable>, BridgeError> {
        let key = key.into();
        self.request(|reply| BridgeCommand::GetVariable { key, reply })
            .await
    }

    pub async fn liveness(&self) -> Result<LivenessSnapshot, BridgeError> {
        self.request(|reply| BridgeCommand::GetLiveness { reply })
            .await
    }

    /// Subscribe to one notification per changed variable per flush.
    pub fn subscribe(&self) -> broadcast::Receiver<VariableUpdate> {
        self.updates.subscribe()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> BridgeCommand,
    ) -> Result<T, BridgeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(command(reply_tx))
            .await
            .map_err(|_| BridgeError::ActorShutdown)?;
        reply_rx.await.map_err(|_| BridgeError::ActorShutdown)
    }
}
