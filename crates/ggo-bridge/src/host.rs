//! The control surface host, as seen from the bridge.
//!
//! The host owns variable storage, feedback evaluation and status display.
//! The bridge only pushes changed values, asks for feedbacks to be
//! re-checked, and reports connection status.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Utc;
use ggo_protocol::{HostEvent, InstanceStatus, Value};
use tracing::{debug, info, warn};

/// Sink for everything the bridge reports to the host.
pub trait Host: Send + Sync {
    /// Store a batch of changed variable values.
    fn set_variable_values(&self, values: &BTreeMap<String, Value>);

    /// Re-evaluate display logic that depends on variables.
    fn check_feedbacks(&self);

    /// Report connection status.
    fn update_status(&self, status: InstanceStatus, message: Option<&str>);
}

/// Host that streams [`HostEvent`]s as JSON Lines.
pub struct JsonLinesHost<W> {
    out: Mutex<W>,
}

impl JsonLinesHost<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonLinesHost<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Consume the host and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: &HostEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to serialize host event");
                return;
            }
        };

        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            warn!(error = %e, "Failed to write host event");
        }
    }
}

impl<W: Write + Send> Host for JsonLinesHost<W> {
    fn set_variable_values(&self, values: &BTreeMap<String, Value>) {
        self.emit(&HostEvent::Variables {
            values: values.clone(),
            timestamp: Utc::now(),
        });
    }

    fn check_feedbacks(&self) {
        self.emit(&HostEvent::CheckFeedbacks);
    }

    fn update_status(&self, status: InstanceStatus, message: Option<&str>) {
        self.emit(&HostEvent::Status {
            status,
            message: message.map(str::to_string),
        });
    }
}

/// Host that only logs; used by one-shot commands.
#[derive(Debug, Default)]
pub struct LogHost;

impl Host for LogHost {
    fn set_variable_values(&self, values: &BTreeMap<String, Value>) {
        for (key, value) in values {
            debug!(variable = %key, %value, "Variable updated");
        }
    }

    fn check_feedbacks(&self) {}

    fn update_status(&self, status: InstanceStatus, message: Option<&str>) {
        info!(?status, message = message.unwrap_or_default(), "Status changed");
    }
}
