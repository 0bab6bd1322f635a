//! Extra context vars policy.
//!
//! A deployment can inject additional key/value pairs into the variables
//! exported to subprocesses. Providers return raw JSON pairs; the exporter
//! rejects anything that is not a string on either side.

use indexmap::IndexMap;
use serde_json::Value;

use crate::app::Context;
use crate::config::SdkConfig;

pub trait ContextVarsProvider: Send + Sync {
    fn context_vars(&self, context: &Context) -> Vec<(Value, Value)>;
}

impl<F> ContextVarsProvider for F
where
    F: Fn(&Context) -> Vec<(Value, Value)> + Send + Sync,
{
    fn context_vars(&self, context: &Context) -> Vec<(Value, Value)> {
        self(context)
    }
}

/// No extra vars.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContextVars;

impl ContextVarsProvider for NoContextVars {
    fn context_vars(&self, _context: &Context) -> Vec<(Value, Value)> {
        Vec::new()
    }
}

/// Fixed vars, usually taken from [`SdkConfig::context_vars`].
#[derive(Debug, Clone, Default)]
pub struct StaticContextVars {
    vars: IndexMap<String, Value>,
}

impl StaticContextVars {
    pub fn new(vars: IndexMap<String, Value>) -> Self {
        Self { vars }
    }

    pub fn from_config(config: &SdkConfig) -> Self {
        Self::new(config.context_vars.clone())
    }
}

impl ContextVarsProvider for StaticContextVars {
    fn context_vars(&self, _context: &Context) -> Vec<(Value, Value)> {
        self.vars
            .iter()
            .map(|(key, value)| (Value::String(key.clone()), value.clone()))
            .collect()
    }
}
