//! Bridge actor.
//!
//! A single task owns the device session and every piece of mutable bridge
//! state: the variable sink, the coalescer and the liveness monitor. Commands
//! from handles, transport events and both sets of deadlines are all handled
//! in one `select!` loop, so each inbound message is fully processed before
//! the next event is looked at.

use std::future::pending;
use std::ops::ControlFlow;
use std::sync::Arc;

use ggo_protocol::{InstanceStatus, Message, Value, address};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::coalesce::{Batch, Coalescer};
use crate::config::EndpointConfig;
use crate::error::BridgeError;
use crate::liveness::{
    HEARTBEAT_LOST, HEARTBEAT_VARIABLE, LivenessAction, LivenessMonitor, SyncReason,
};
use crate::registry::VariableSink;
use crate::transport::{Connector, Transport, TransportEvent};
use crate::translate;

use super::actor_types::{ActorConfig, BridgeCommand, CHANNEL_CAPACITY, EVENT_CHANNEL_CAPACITY};
use super::handle::BridgeHandle;

/// An open device session: the transport and the events it produces.
struct OpenSession {
    transport: Box<dyn Transport>,
    events: mpsc::Receiver<TransportEvent>,
}

pub struct BridgeActor {
    sink: VariableSink,
    coalescer: Coalescer,
    liveness: LivenessMonitor,
    connector: Arc<dyn Connector>,
    session: Option<OpenSession>,
    command_rx: mpsc::Receiver<BridgeCommand>,
    shutdown_rx: watch::Receiver<bool>,
}

impl BridgeActor {
    /// Spawn the actor. No session is open until [`BridgeHandle::init`].
    pub fn spawn(
        config: ActorConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (BridgeHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let sink = VariableSink::new(config.registry, config.host);
        let handle = BridgeHandle::new(tx, sink.updates());

        let actor = Self {
            sink,
            coalescer: Coalescer::new(config.timing.debounce(), config.timing.flood_flush()),
            liveness: LivenessMonitor::new(
                config.timing.heartbeat_timeout(),
                config.timing.sync_retry(),
            ),
            connector: config.connector,
            session: None,
            command_rx: rx,
            shutdown_rx,
        };

        let task = tokio::spawn(actor.run());
        (handle, task)
    }

    async fn run(mut self) {
        self.command_loop().await;
        self.close().await;
        debug!("Bridge actor stopped");
    }

    async fn command_loop(&mut self) {
        loop {
            let flush_at = self.coalescer.next_deadline();
            let liveness_at = self.liveness.next_deadline();

            tokio::select! {
                changed = self.shutdown_rx.changed() => {
                    // A dropped sender counts as shutdown.
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        debug!("Bridge actor received shutdown signal");
                        break;
                    }
                }

                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        // Every handle was dropped.
                        break;
                    };
                    if self.handle_command(cmd).await.is_break() {
                        break;
                    }
                }

                event = next_event(&mut self.session) => {
                    self.on_transport_event(event).await;
                }

                _ = wait_until(flush_at) => {
                    self.flush_due();
                }

                _ = wait_until(liveness_at) => {
                    for action in self.liveness.on_deadline(Instant::now()) {
                        self.perform(action).await;
                    }
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: BridgeCommand) -> ControlFlow<()> {
        match cmd {
            BridgeCommand::Init { endpoint, reply } => {
                let result = self.init(endpoint).await;
                let _ = reply.send(result);
            }
            BridgeCommand::Close { reply } => {
                self.close().await;
                let _ = reply.send(());
            }
            BridgeCommand::Destroy { reply } => {
                self.close().await;
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
            BridgeCommand::SendCommand {
                name,
                values,
                reply,
            } => {
                let result = self.send_command(&name, &values).await;
                let _ = reply.send(result);
            }
            BridgeCommand::RequestSync { reply } => {
                self.request_sync(SyncReason::Requested).await;
                let _ = reply.send(());
            }
            BridgeCommand::IsOpen { reply } => {
                let _ = reply.send(self.session.is_some());
            }
            BridgeCommand::GetVariables { reply } => {
                let _ = reply.send(self.sink.registry().variables());
            }
            BridgeCommand::GetVariable { key, reply } => {
                let _ = reply.send(self.sink.registry().get(&key));
            }
            BridgeCommand::GetLiveness { reply } => {
                let _ = reply.send(self.liveness.snapshot());
            }
        }
        ControlFlow::Continue(())
    }

    // ------------------------------------------------------------------------
    // Session Lifecycle
    // ------------------------------------------------------------------------

    async fn init(&mut self, endpoint: EndpointConfig) -> Result<(), BridgeError> {
        if let Err(e) = endpoint.validate() {
            error!(error = %e, "Cannot start device session");
            self.sink
                .host()
                .update_status(InstanceStatus::BadConfig, Some(e.to_string().as_str()));
            return Err(e.into());
        }

        self.close().await;

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let transport = match self.connector.open(&endpoint, events_tx).await {
            Ok(transport) => transport,
            Err(e) => {
                error!(
                    host = %endpoint.host,
                    port = endpoint.port,
                    error = %e,
                    "Failed to open device session"
                );
                self.sink.host().update_status(
                    InstanceStatus::ConnectionFailure,
                    Some(e.to_string().as_str()),
                );
                return Err(e.into());
            }
        };

        info!(remote = %transport.remote(), "Device session opened");
        self.session = Some(OpenSession {
            transport,
            events: events_rx,
        });
        self.sink.host().update_status(InstanceStatus::Ok, None);
        Ok(())
    }

    /// Cancel pending flushes and liveness timers, then release the transport.
    async fn close(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        let discarded = self.coalescer.clear();
        if discarded > 0 {
            debug!(discarded, "Discarding pending updates");
        }
        self.liveness.reset();

        session.transport.close().await;
        info!(remote = %session.transport.remote(), "Device session closed");
    }

    // ------------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------------

    async fn send_command(&mut self, name: &str, values: &[i32]) -> Result<(), BridgeError> {
        let session = self.session.as_ref().ok_or(BridgeError::NotConnected)?;
        let message = Message::command(name, values);
        debug!(
            address = %message.address,
            remote = %session.transport.remote(),
            ?values,
            "Sending command"
        );
        session.transport.send(&message).await?;
        Ok(())
    }

    async fn request_sync(&mut self, reason: SyncReason) {
        if self.session.is_none() {
            debug!("No device session, skipping full state sync request");
            return;
        }

        match reason {
            SyncReason::Requested => debug!("Requesting full state sync"),
            SyncReason::Retry => debug!("Full state sync still pending, requesting again"),
        }

        if let Err(e) = self.send_command(address::UPDATE_COMMAND, &[1]).await {
            error!(error = %e, "Failed to request full state sync");
        }
        self.liveness.sync_requested(Instant::now());
    }

    // ------------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------------

    async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(message) => self.on_message(message).await,
            TransportEvent::Error(e) => error!(error = %e, "Device transport error"),
        }
    }

    async fn on_message(&mut self, message: Message) {
        if message.address == address::HEARTBEAT {
            if let Some(action) = self.liveness.on_heartbeat(Instant::now()) {
                self.perform(action).await;
            }
        }

        if message.address == address::STATE_UPDATED {
            self.liveness.on_state_updated();
            info!("Received complete state update");
            return;
        }

        if message.address.starts_with(address::STATE_PREFIX) {
            self.collect_state(message);
        } else {
            debug!(address = %message.address, "Ignoring message outside the state namespace");
        }
    }

    fn collect_state(&mut self, message: Message) {
        let key = match translate::variable_key(&message.address, &message.args) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "Dropping malformed state message");
                return;
            }
        };

        if !self.sink.registry().contains(&key) {
            warn!(variable = %key, address = %message.address, "Unknown variable");
            return;
        }

        let Some(value) = message.arg_value(0) else {
            warn!(address = %message.address, "Dropping state message without a value");
            return;
        };

        let flooding = translate::is_flooding(&message.address);
        self.coalescer.collect(key, value, flooding, Instant::now());
    }

    fn flush_due(&mut self) {
        for (kind, batch) in self.coalescer.take_due(Instant::now()) {
            debug!(?kind, size = batch.len(), "Flushing coalesced updates");
            self.sink.apply(batch);
        }
    }

    async fn perform(&mut self, action: LivenessAction) {
        match action {
            LivenessAction::MarkHeartbeatLost => {
                warn!("Heartbeat lost");
                let lost = Batch::from([(
                    HEARTBEAT_VARIABLE.to_string(),
                    Value::Int(HEARTBEAT_LOST),
                )]);
                self.sink.apply(lost);
            }
            LivenessAction::RequestSync(reason) => self.request_sync(reason).await,
        }
    }
}

// ============================================================================
// Private Helpers
// ============================================================================

/// Next event of the open session; pends forever without one.
async fn next_event(session: &mut Option<OpenSession>) -> TransportEvent {
    match session {
        Some(session) => match session.events.recv().await {
            Some(event) => event,
            None => pending().await,
        },
        None => pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}
