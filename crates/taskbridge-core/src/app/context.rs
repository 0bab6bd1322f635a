use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use super::connections::ConnectionAccessor;
use super::inlets::InletEventsAccessors;
use super::outlets::OutletEventAccessors;
use super::triggering::TriggeringAssetEventsAccessor;
use super::variables::VariableAccessor;
use crate::domain::task::TaskIdentity;

/// Everything task code can reach during one attempt.
///
/// Built once per attempt and shared read-only; only the outlet accessors
/// mutate, through their own locks.
#[derive(Debug, Clone, Default)]
pub struct Context {
    identity: Option<TaskIdentity>,
    entries: IndexMap<String, Value>,
    accessors: Option<ContextAccessors>,
}

#[derive(Debug, Clone)]
pub struct ContextAccessors {
    pub var: VariableAccessor,
    pub var_json: VariableAccessor,
    pub conn: ConnectionAccessor,
    pub inlet_events: Arc<InletEventsAccessors>,
    pub outlet_events: Arc<OutletEventAccessors>,
    pub triggering_asset_events: Arc<TriggeringAssetEventsAccessor>,
}

impl Context {
    /// An empty context: no identity, no entries, no accessors.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(mut self, identity: TaskIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_entry(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(name.into(), value.into());
        self
    }

    pub fn with_accessors(mut self, accessors: ContextAccessors) -> Self {
        self.accessors = Some(accessors);
        self
    }

    pub fn identity(&self) -> Option<&TaskIdentity> {
        self.identity.as_ref()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> &IndexMap<String, Value> {
        &self.entries
    }

    pub fn accessors(&self) -> Option<&ContextAccessors> {
        self.accessors.as_ref()
    }
}
