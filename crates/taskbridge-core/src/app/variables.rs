//! VariableAccessor - lazy, read-only access to variables.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::domain::errors::ExecutionError;
use crate::domain::messages::{ErrorType, ToSupervisor, ToTask};
use crate::domain::variable::Variable;
use crate::ports::SupervisorComms;

/// Every lookup is a fresh round trip; nothing is cached.
#[derive(Clone)]
pub struct VariableAccessor {
    comms: Arc<dyn SupervisorComms>,
    deserialize_json: bool,
}

impl VariableAccessor {
    pub fn new(comms: Arc<dyn SupervisorComms>, deserialize_json: bool) -> Self {
        Self {
            comms,
            deserialize_json,
        }
    }

    pub fn deserialize_json(&self) -> bool {
        self.deserialize_json
    }

    pub fn fetch(&self, key: &str) -> Result<Variable, ExecutionError> {
        let request = ToSupervisor::GetVariable {
            key: key.to_string(),
        };
        match self.comms.send(request)? {
            ToTask::VariableResult(result) => Variable::from_result(result, self.deserialize_json),
            ToTask::ErrorResponse(err) => Err(err.into_error(format!("variable {key}"))),
            other => Err(ExecutionError::unexpected("GetVariable", &other)),
        }
    }

    pub fn get(&self, key: &str) -> Result<Value, ExecutionError> {
        self.fetch(key).map(|variable| variable.value)
    }

    /// Returns `default` verbatim when the variable does not exist.
    ///
    /// Only `VARIABLE_NOT_FOUND` falls back. Other supervisor errors,
    /// transport failures and undecodable JSON are still errors.
    pub fn get_or(&self, key: &str, default: impl Into<Value>) -> Result<Value, ExecutionError> {
        match self.get(key) {
            Err(err) if err.is_not_found_of(ErrorType::VariableNotFound) => Ok(default.into()),
            other => other,
        }
    }
}

impl fmt::Debug for VariableAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableAccessor")
            .field("deserialize_json", &self.deserialize_json)
            .finish_non_exhaustive()
    }
}
