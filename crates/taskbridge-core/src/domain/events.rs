//! Asset events: occurrences of an asset being produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::asset::{AssetAlias, AssetAliasUniqueKey, AssetUniqueKey};
use super::errors::ExecutionError;
use super::messages::{AssetResult, ToSupervisor, ToTask};
use crate::ports::SupervisorComms;

/// XCom key under which a task's return value is published.
pub const XCOM_RETURN_KEY: &str = "return_value";

/// One recorded production of an asset. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetEvent {
    #[serde(default)]
    pub id: i64,
    pub asset: AssetResult,
    #[serde(default)]
    pub extra: Map<String, Value>,
    #[serde(default)]
    pub source_dag_id: Option<String>,
    #[serde(default)]
    pub source_run_id: Option<String>,
    #[serde(default)]
    pub source_task_id: Option<String>,
    #[serde(default)]
    pub source_map_index: Option<i64>,
    /// Aliases through which the producer emitted this event.
    #[serde(default)]
    pub source_aliases: Vec<AssetAlias>,
    pub timestamp: DateTime<Utc>,
}

impl AssetEvent {
    pub fn asset_key(&self) -> AssetUniqueKey {
        self.asset.unique_key()
    }

    pub fn alias_keys(&self) -> impl Iterator<Item = AssetAliasUniqueKey> + '_ {
        self.source_aliases.iter().map(AssetAliasUniqueKey::from_alias)
    }

    /// The task instance that produced this event.
    ///
    /// `None` for events recorded without full producer identity.
    pub fn source_task_instance(&self) -> Option<SourceTaskInstance> {
        Some(SourceTaskInstance {
            dag_id: self.source_dag_id.clone()?,
            run_id: self.source_run_id.clone()?,
            task_id: self.source_task_id.clone()?,
            map_index: self.source_map_index?,
        })
    }
}

/// Back-reference to the producer of an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceTaskInstance {
    pub dag_id: String,
    pub run_id: String,
    pub task_id: String,
    pub map_index: i64,
}

impl SourceTaskInstance {
    /// Fetches the producer's return value.
    pub fn xcom_pull(&self, comms: &dyn SupervisorComms) -> Result<Value, ExecutionError> {
        self.xcom_pull_key(comms, XCOM_RETURN_KEY)
    }

    pub fn xcom_pull_key(&self, comms: &dyn SupervisorComms, key: &str) -> Result<Value, ExecutionError> {
        let request = ToSupervisor::GetXCom {
            key: key.to_string(),
            dag_id: self.dag_id.clone(),
            run_id: self.run_id.clone(),
            task_id: self.task_id.clone(),
            map_index: self.map_index,
        };

        match comms.send(request)? {
            ToTask::XComResult(result) => Ok(result.value),
            ToTask::ErrorResponse(err) => Err(err.into_error(format!("xcom {key} of {self}"))),
            other => Err(ExecutionError::unexpected("GetXCom", &other)),
        }
    }
}

impl fmt::Display for SourceTaskInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}[{}]",
            self.dag_id, self.run_id, self.task_id, self.map_index
        )
    }
}

/// Produced when a task attaches a concrete asset to an outlet alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetAliasEvent {
    pub source_alias_name: String,
    pub dest_asset_key: AssetUniqueKey,
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::messages::{ErrorResponse, ErrorType, XComResult};
    use crate::impls::ScriptedComms;
    use serde_json::json;

    fn event(value: Value) -> AssetEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn source_task_instance_requires_full_identity() {
        let complete = event(json!({
            "asset": {"name": "2", "uri": "2"},
            "source_dag_id": "d1",
            "source_run_id": "r1",
            "source_task_id": "t2",
            "source_map_index": -1,
            "timestamp": "2025-01-01T00:06:07Z"
        }));
        assert_eq!(
            complete.source_task_instance(),
            Some(SourceTaskInstance {
                dag_id: "d1".to_string(),
                run_id: "r1".to_string(),
                task_id: "t2".to_string(),
                map_index: -1,
            })
        );

        let legacy = event(json!({
            "asset": {"name": "2", "uri": "2"},
            "source_dag_id": "d1",
            "timestamp": "2025-01-01T00:06:07Z"
        }));
        assert_eq!(legacy.source_task_instance(), None);
    }

    #[test]
    fn xcom_pull_sends_one_request_for_the_return_value() {
        let comms = ScriptedComms::new();
        comms.push(ToTask::XComResult(XComResult {
            key: XCOM_RETURN_KEY.to_string(),
            value: json!("__example_xcom_value__"),
        }));

        let source = SourceTaskInstance {
            dag_id: "__dag__".to_string(),
            run_id: "__run__".to_string(),
            task_id: "__task__".to_string(),
            map_index: 0,
        };

        assert_eq!(source.xcom_pull(&comms).unwrap(), json!("__example_xcom_value__"));
        assert_eq!(
            comms.requests(),
            vec![ToSupervisor::GetXCom {
                key: XCOM_RETURN_KEY.to_string(),
                dag_id: "__dag__".to_string(),
                run_id: "__run__".to_string(),
                task_id: "__task__".to_string(),
                map_index: 0,
            }]
        );
    }

    #[test]
    fn xcom_pull_surfaces_missing_values() {
        let comms = ScriptedComms::new();
        comms.push(ToTask::ErrorResponse(ErrorResponse {
            error: ErrorType::XcomNotFound,
            detail: json!({"key": "other"}),
        }));

        let source = SourceTaskInstance {
            dag_id: "d".to_string(),
            run_id: "r".to_string(),
            task_id: "t".to_string(),
            map_index: -1,
        };

        let err = source.xcom_pull_key(&comms, "other").unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("xcom other of d/r/t[-1]"));
    }
}
