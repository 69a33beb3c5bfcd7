//! Variable registry and the sink that feeds it.
//!
//! The registry is defined up front (from configuration) and the bridge only
//! ever updates values of keys that already exist. [`VariableSink::apply`] is
//! the single write path: it diffs a flushed batch against stored values and
//! only tells the host about what actually changed.

use std::collections::BTreeMap;
use std::sync::Arc;

use ggo_protocol::Value;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::coalesce::Batch;
use crate::host::Host;

/// Capacity of the `variableUpdated` broadcast channel.
pub const UPDATE_CHANNEL_CAPACITY: usize = 1024;

/// A registry entry as exposed to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    pub key: String,
    pub name: String,
    pub value: Option<Value>,
}

/// Emitted once per changed key per applied batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableUpdate {
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone)]
struct Record {
    name: String,
    value: Option<Value>,
}

/// Known variables and their current values.
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    records: BTreeMap<String, Record>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `(key, display name)` definitions.
    pub fn from_definitions<I, K, N>(definitions: I) -> Self
    where
        I: IntoIterator<Item = (K, N)>,
        K: Into<String>,
        N: Into<String>,
    {
        let mut registry = Self::new();
        for (key, name) in definitions {
            registry.define(key, name);
        }
        registry
    }

    /// Define a variable with no value. Redefining keeps the current value.
    pub fn define(&mut self, key: impl Into<String>, name: impl Into<String>) {
        let name = name.into();
        self.records
            .entry(key.into())
            .and_modify(|record| record.name = name.clone())
            .or_insert(Record { name, value: None });
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<Variable> {
        self.records.get(key).map(|record| Variable {
            key: key.to_string(),
            name: record.name.clone(),
            value: record.value.clone(),
        })
    }

    pub fn variables(&self) -> Vec<Variable> {
        self.records
            .iter()
            .map(|(key, record)| Variable {
                key: key.clone(),
                name: record.name.clone(),
                value: record.value.clone(),
            })
            .collect()
    }

    /// Store every known key whose value differs; return the changed subset.
    ///
    /// Unknown keys are ignored. Numbers compare by value, so a device that
    /// switches between integer and float tags does not count as a change.
    pub fn update(&mut self, batch: Batch) -> Batch {
        let mut changed = Batch::new();
        for (key, value) in batch {
            let Some(record) = self.records.get_mut(&key) else {
                continue;
            };
            if record.value.as_ref().is_some_and(|current| current.same_as(&value)) {
                continue;
            }
            record.value = Some(value.clone());
            changed.insert(key, value);
        }
        changed
    }
}

/// Applies flushed batches to the registry and reports changes.
pub struct VariableSink {
    registry: VariableRegistry,
    host: Arc<dyn Host>,
    updates: broadcast::Sender<VariableUpdate>,
}

impl VariableSink {
    pub fn new(registry: VariableRegistry, host: Arc<dyn Host>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            registry,
            host,
            updates,
        }
    }

    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// Subscribe to per-key change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<VariableUpdate> {
        self.updates.subscribe()
    }

    /// Sender half, so handles can subscribe without going through the owner.
    pub fn updates(&self) -> broadcast::Sender<VariableUpdate> {
        self.updates.clone()
    }

    /// Apply a batch. Returns the number of variables that changed.
    ///
    /// The host is only called when at least one value changed.
    pub fn apply(&mut self, batch: Batch) -> usize {
        let changed = self.registry.update(batch);
        if changed.is_empty() {
            return 0;
        }

        for (key, value) in &changed {
            // No subscribers is fine.
            let _ = self.updates.send(VariableUpdate {
                key: key.clone(),
                value: value.clone(),
            });
        }

        self.host.set_variable_values(&changed);
        self.host.check_feedbacks();

        debug!(count = changed.len(), "Updated values of variables");
        changed.len()
    }
}
