//! InMemorySupervisor - 開発・テスト用の fake control plane
//!
//! connection、variable、asset、asset event、XCom をメモリに保持し、
//! task runtime が送るすべての種類のリクエストに応答します。使い方:
//! - 直接 [`SupervisorComms`] として（同期、同一スレッド）
//! - `BlockingComms` の裏の [`SupervisorTransport`] として
//! - [`InMemorySupervisor::serve`] で `ChannelTransport` の相手側として

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use super::channel_transport::PendingRequest;
use crate::domain::asset::Asset;
use crate::domain::errors::CommsError;
use crate::domain::events::{AssetEvent, SourceTaskInstance};
use crate::domain::messages::{
    AssetEventsResult, AssetResult, ConnectionResult, ErrorResponse, ErrorType, RequestFrame,
    ResponseFrame, ToSupervisor, ToTask, VariableResult, XComResult,
};
use crate::ports::{SupervisorComms, SupervisorTransport};
use crate::sync::lock;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct XComKey {
    source: SourceTaskInstance,
    key: String,
}

#[derive(Debug, Default)]
struct SupervisorState {
    connections: HashMap<String, ConnectionResult>,
    variables: HashMap<String, String>,
    assets: Vec<AssetResult>,
    /// Kept in production (timestamp) order.
    events: Vec<AssetEvent>,
    xcoms: HashMap<XComKey, Value>,
    requests: Vec<ToSupervisor>,
}

#[derive(Debug, Default)]
pub struct InMemorySupervisor {
    state: Mutex<SupervisorState>,
}

impl InMemorySupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connection(self, connection: ConnectionResult) -> Self {
        self.add_connection(connection);
        self
    }

    pub fn with_variable(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_variable(key, value);
        self
    }

    pub fn with_asset(self, asset: &Asset) -> Self {
        self.add_asset(asset);
        self
    }

    pub fn with_asset_event(self, event: AssetEvent) -> Self {
        self.add_asset_event(event);
        self
    }

    pub fn with_xcom(self, source: SourceTaskInstance, key: impl Into<String>, value: Value) -> Self {
        self.add_xcom(source, key, value);
        self
    }

    pub fn add_connection(&self, connection: ConnectionResult) {
        lock(&self.state)
            .connections
            .insert(connection.conn_id.clone(), connection);
    }

    pub fn add_variable(&self, key: impl Into<String>, value: impl Into<String>) {
        lock(&self.state).variables.insert(key.into(), value.into());
    }

    pub fn add_asset(&self, asset: &Asset) {
        lock(&self.state).assets.push(AssetResult {
            name: asset.name.clone(),
            uri: asset.uri.clone(),
            group: asset.group.clone(),
            extra: asset.extra.clone(),
        });
    }

    pub fn add_asset_event(&self, event: AssetEvent) {
        let mut state = lock(&self.state);
        let at = state
            .events
            .partition_point(|existing| existing.timestamp <= event.timestamp);
        state.events.insert(at, event);
    }

    pub fn add_xcom(&self, source: SourceTaskInstance, key: impl Into<String>, value: Value) {
        let key = XComKey {
            source,
            key: key.into(),
        };
        lock(&self.state).xcoms.insert(key, value);
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<ToSupervisor> {
        lock(&self.state).requests.clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.state).requests.len()
    }

    /// Answers one request.
    pub fn handle(&self, request: ToSupervisor) -> ToTask {
        let mut state = lock(&self.state);
        state.requests.push(request.clone());

        match request {
            ToSupervisor::GetConnection { conn_id } => match state.connections.get(&conn_id) {
                Some(connection) => ToTask::ConnectionResult(connection.clone()),
                None => not_found(ErrorType::ConnectionNotFound, json!({ "conn_id": conn_id })),
            },
            ToSupervisor::GetVariable { key } => match state.variables.get(&key) {
                Some(value) => ToTask::VariableResult(VariableResult {
                    key,
                    value: Some(value.clone()),
                }),
                None => not_found(ErrorType::VariableNotFound, json!({ "key": key })),
            },
            ToSupervisor::GetAssetByName { name } => {
                match state.assets.iter().find(|asset| asset.name == name) {
                    Some(asset) => ToTask::AssetResult(asset.clone()),
                    None => not_found(ErrorType::AssetNotFound, json!({ "name": name })),
                }
            }
            ToSupervisor::GetAssetByUri { uri } => {
                match state.assets.iter().find(|asset| asset.uri == uri) {
                    Some(asset) => ToTask::AssetResult(asset.clone()),
                    None => not_found(ErrorType::AssetNotFound, json!({ "uri": uri })),
                }
            }
            ToSupervisor::GetAssetEventByAsset { name: None, uri: None } => {
                ToTask::ErrorResponse(ErrorResponse {
                    error: ErrorType::GenericError,
                    detail: json!("either name or uri is required"),
                })
            }
            ToSupervisor::GetAssetEventByAsset { name, uri } => {
                let asset_events = state
                    .events
                    .iter()
                    .filter(|event| name.as_ref().is_none_or(|name| *name == event.asset.name))
                    .filter(|event| uri.as_ref().is_none_or(|uri| *uri == event.asset.uri))
                    .cloned()
                    .collect();
                ToTask::AssetEventsResult(AssetEventsResult { asset_events })
            }
            ToSupervisor::GetAssetEventByAssetAlias { alias_name } => {
                let asset_events = state
                    .events
                    .iter()
                    .filter(|event| event.source_aliases.iter().any(|alias| alias.name == alias_name))
                    .cloned()
                    .collect();
                ToTask::AssetEventsResult(AssetEventsResult { asset_events })
            }
            ToSupervisor::GetXCom {
                key,
                dag_id,
                run_id,
                task_id,
                map_index,
            } => {
                let lookup = XComKey {
                    source: SourceTaskInstance {
                        dag_id,
                        run_id,
                        task_id,
                        map_index,
                    },
                    key,
                };
                match state.xcoms.get(&lookup) {
                    Some(value) => ToTask::XComResult(XComResult {
                        key: lookup.key,
                        value: value.clone(),
                    }),
                    None => not_found(
                        ErrorType::XcomNotFound,
                        json!({ "key": lookup.key, "task_id": lookup.source.task_id }),
                    ),
                }
            }
        }
    }

    /// Serves a `ChannelTransport` until every transport handle is dropped.
    pub async fn serve(self: Arc<Self>, mut requests: mpsc::Receiver<PendingRequest>) {
        while let Some(pending) = requests.recv().await {
            let id = pending.frame.id;
            let response = self.handle(pending.frame.body.clone());
            if pending.respond(response).is_err() {
                tracing::debug!(request_id = %id, "task side went away before the response");
            }
        }
    }

    /// Runs [`serve`](Self::serve) on a dedicated thread with its own runtime.
    pub fn serve_in_thread(
        self: Arc<Self>,
        requests: mpsc::Receiver<PendingRequest>,
    ) -> Result<JoinHandle<()>, CommsError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .map_err(CommsError::Runtime)?;
        Ok(std::thread::spawn(move || runtime.block_on(self.serve(requests))))
    }
}

fn not_found(error: ErrorType, detail: Value) -> ToTask {
    ToTask::ErrorResponse(ErrorResponse { error, detail })
}

impl SupervisorComms for InMemorySupervisor {
    fn send(&self, request: ToSupervisor) -> Result<ToTask, CommsError> {
        Ok(self.handle(request))
    }
}

#[async_trait]
impl SupervisorTransport for InMemorySupervisor {
    async fn round_trip(&self, frame: RequestFrame) -> Result<ResponseFrame, CommsError> {
        Ok(ResponseFrame {
            id: frame.id,
            body: self.handle(frame.body),
        })
    }
}
