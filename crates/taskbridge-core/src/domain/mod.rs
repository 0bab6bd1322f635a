//! Domain model: references, resolved entities, events and protocol messages.

pub mod asset;
pub mod connection;
pub mod errors;
pub mod events;
pub mod ids;
pub mod messages;
pub mod task;
pub mod variable;

pub use asset::{
    Asset, AssetAlias, AssetAliasUniqueKey, AssetLike, AssetRef, AssetUniqueKey, EntityKey,
};
pub use connection::Connection;
pub use errors::{CommsError, ErrorKind, ExecutionError};
pub use events::{AssetAliasEvent, AssetEvent, SourceTaskInstance, XCOM_RETURN_KEY};
pub use ids::RequestId;
pub use messages::{
    AssetEventsResult, AssetResult, ConnectionResult, ErrorResponse, ErrorType, RequestFrame,
    ResponseFrame, ToSupervisor, ToTask, VariableResult, XComResult,
};
pub use task::{TaskDeclaration, TaskIdentity};
pub use variable::Variable;

/// Name of a JSON value's type, for error messages.
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
