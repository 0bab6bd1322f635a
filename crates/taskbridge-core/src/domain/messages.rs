//! Request / response messages exchanged with the supervisor.
//!
//! Only the shape is defined here. Both enums are internally tagged on
//! `type` so any serde transport can carry them, but the byte encoding is up
//! to the transport.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::asset::AssetUniqueKey;
use super::events::AssetEvent;
use super::ids::RequestId;

/// Requests sent from the task runtime to the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToSupervisor {
    GetConnection {
        conn_id: String,
    },
    GetVariable {
        key: String,
    },
    GetAssetByName {
        name: String,
    },
    GetAssetByUri {
        uri: String,
    },
    GetAssetEventByAsset {
        name: Option<String>,
        uri: Option<String>,
    },
    GetAssetEventByAssetAlias {
        alias_name: String,
    },
    GetXCom {
        key: String,
        dag_id: String,
        run_id: String,
        task_id: String,
        map_index: i64,
    },
}

impl ToSupervisor {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetConnection { .. } => "GetConnection",
            Self::GetVariable { .. } => "GetVariable",
            Self::GetAssetByName { .. } => "GetAssetByName",
            Self::GetAssetByUri { .. } => "GetAssetByUri",
            Self::GetAssetEventByAsset { .. } => "GetAssetEventByAsset",
            Self::GetAssetEventByAssetAlias { .. } => "GetAssetEventByAssetAlias",
            Self::GetXCom { .. } => "GetXCom",
        }
    }
}

/// Responses sent from the supervisor back to the task runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToTask {
    ConnectionResult(ConnectionResult),
    VariableResult(VariableResult),
    AssetResult(AssetResult),
    AssetEventsResult(AssetEventsResult),
    XComResult(XComResult),
    ErrorResponse(ErrorResponse),
}

impl ToTask {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionResult(_) => "ConnectionResult",
            Self::VariableResult(_) => "VariableResult",
            Self::AssetResult(_) => "AssetResult",
            Self::AssetEventsResult(_) => "AssetEventsResult",
            Self::XComResult(_) => "XComResult",
            Self::ErrorResponse(_) => "ErrorResponse",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionResult {
    pub conn_id: String,
    pub conn_type: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub extra: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableResult {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// An asset as known to the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetResult {
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl AssetResult {
    pub fn unique_key(&self) -> AssetUniqueKey {
        AssetUniqueKey::new(self.name.clone(), self.uri.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssetEventsResult {
    pub asset_events: Vec<AssetEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XComResult {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    ConnectionNotFound,
    VariableNotFound,
    AssetNotFound,
    XcomNotFound,
    GenericError,
}

impl ErrorType {
    pub fn is_not_found(self) -> bool {
        !matches!(self, Self::GenericError)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionNotFound => "CONNECTION_NOT_FOUND",
            Self::VariableNotFound => "VARIABLE_NOT_FOUND",
            Self::AssetNotFound => "ASSET_NOT_FOUND",
            Self::XcomNotFound => "XCOM_NOT_FOUND",
            Self::GenericError => "GENERIC_ERROR",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error answer; `detail` echoes what was asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorType,
    #[serde(default)]
    pub detail: Value,
}

/// A request stamped with its correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: RequestId,
    pub body: ToSupervisor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: RequestId,
    pub body: ToTask,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_are_tagged_by_type() {
        let v = serde_json::to_value(ToSupervisor::GetAssetByName {
            name: "n".to_string(),
        })
        .unwrap();
        assert_eq!(v, json!({"type": "GetAssetByName", "name": "n"}));
    }

    #[test]
    fn error_type_uses_screaming_names() {
        let resp: ToTask = serde_json::from_value(json!({
            "type": "ErrorResponse",
            "error": "XCOM_NOT_FOUND",
            "detail": {"key": "k"}
        }))
        .unwrap();

        let ToTask::ErrorResponse(err) = resp else {
            panic!("expected an error response");
        };
        assert_eq!(err.error, ErrorType::XcomNotFound);
        assert_eq!(err.error.to_string(), "XCOM_NOT_FOUND");
    }

    #[test]
    fn connection_result_tolerates_missing_optionals() {
        let resp: ToTask = serde_json::from_value(json!({
            "type": "ConnectionResult",
            "conn_id": "c",
            "conn_type": "mysql"
        }))
        .unwrap();
        assert_eq!(resp.name(), "ConnectionResult");
    }
}
