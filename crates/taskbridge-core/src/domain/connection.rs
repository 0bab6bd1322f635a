//! Connection value object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::json_type_name;
use super::messages::ConnectionResult;

/// Resolved connection configuration. Never mutated once built.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub conn_id: String,
    pub conn_type: String,
    pub host: Option<String>,
    pub schema: Option<String>,
    pub login: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
    /// JSON-encoded extras, as stored by the control plane.
    pub extra: Option<String>,
}

impl Connection {
    pub fn new(conn_id: impl Into<String>, conn_type: impl Into<String>) -> Self {
        Self {
            conn_id: conn_id.into(),
            conn_type: conn_type.into(),
            host: None,
            schema: None,
            login: None,
            password: None,
            port: None,
            extra: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_login(mut self, login: impl Into<String>, password: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }

    /// Decoded `extra`.
    ///
    /// Unlike variables, a broken payload does not fail the lookup: the
    /// failure is logged and an empty map is returned.
    pub fn extra_dejson(&self) -> Map<String, Value> {
        let Some(extra) = self.extra.as_deref().filter(|extra| !extra.is_empty()) else {
            return Map::new();
        };

        match serde_json::from_str::<Value>(extra) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                tracing::error!(
                    conn_id = %self.conn_id,
                    found = json_type_name(&other),
                    "Failed to deserialize extra property `extra`, returning empty dictionary"
                );
                Map::new()
            }
            Err(err) => {
                tracing::error!(
                    conn_id = %self.conn_id,
                    error = %err,
                    "Failed to deserialize extra property `extra`, returning empty dictionary"
                );
                Map::new()
            }
        }
    }
}

impl From<ConnectionResult> for Connection {
    fn from(result: ConnectionResult) -> Self {
        Self {
            conn_id: result.conn_id,
            conn_type: result.conn_type,
            host: result.host,
            schema: result.schema,
            login: result.login,
            password: result.password,
            port: result.port,
            extra: result.extra,
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("conn_id", &self.conn_id)
            .field("conn_type", &self.conn_type)
            .field("host", &self.host)
            .field("schema", &self.schema)
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("port", &self.port)
            .field("extra", &self.extra)
            .finish()
    }
}
