//! Common test utilities.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use ggo_bridge::config::TimingConfig;
use ggo_bridge::host::Host;
use ggo_bridge::liveness::HEARTBEAT_VARIABLE;
use ggo_bridge::registry::VariableRegistry;
use ggo_bridge::transport::Connector;
use ggo_bridge::{ActorConfig, BridgeActor, BridgeHandle};
use ggo_protocol::{InstanceStatus, Value};

/// Host that records every call.
#[derive(Default)]
pub struct RecordingHost {
    pub batches: Mutex<Vec<BTreeMap<String, Value>>>,
    pub statuses: Mutex<Vec<InstanceStatus>>,
    pub feedback_checks: Mutex<usize>,
}

impl Host for RecordingHost {
    fn set_variable_values(&self, values: &BTreeMap<String, Value>) {
        self.batches.lock().unwrap().push(values.clone());
    }

    fn check_feedbacks(&self) {
        *self.feedback_checks.lock().unwrap() += 1;
    }

    fn update_status(&self, status: InstanceStatus, _message: Option<&str>) {
        self.statuses.lock().unwrap().push(status);
    }
}

/// A cloneable in-memory writer, for inspecting `JsonLinesHost` output.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The variables every test bridge knows about.
pub fn test_registry() -> VariableRegistry {
    VariableRegistry::from_definitions([
        (HEARTBEAT_VARIABLE, "Heartbeat"),
        ("input_mute", "Input mute"),
        ("mixbus_fader_ch3", "Mixbus fader 3"),
    ])
}

/// Spawn a bridge actor with default timing.
///
/// Keep the returned sender alive for the duration of the test.
pub fn spawn_bridge(
    host: Arc<dyn Host>,
    connector: Arc<dyn Connector>,
) -> (BridgeHandle, watch::Sender<bool>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (handle, _task) = BridgeActor::spawn(
        ActorConfig {
            registry: test_registry(),
            host,
            connector,
            timing: TimingConfig::default(),
        },
        shutdown_rx,
    );
    (handle, shutdown_tx)
}
