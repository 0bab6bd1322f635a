//! ConnectionAccessor - lazy, read-only access to connections.

use std::fmt;
use std::sync::Arc;

use crate::domain::connection::Connection;
use crate::domain::errors::ExecutionError;
use crate::domain::messages::{ErrorType, ToSupervisor, ToTask};
use crate::ports::SupervisorComms;

#[derive(Clone)]
pub struct ConnectionAccessor {
    comms: Arc<dyn SupervisorComms>,
}

impl ConnectionAccessor {
    pub fn new(comms: Arc<dyn SupervisorComms>) -> Self {
        Self { comms }
    }

    pub fn get(&self, conn_id: &str) -> Result<Connection, ExecutionError> {
        let request = ToSupervisor::GetConnection {
            conn_id: conn_id.to_string(),
        };
        match self.comms.send(request)? {
            ToTask::ConnectionResult(result) => Ok(Connection::from(result)),
            ToTask::ErrorResponse(err) => Err(err.into_error(format!("connection {conn_id}"))),
            other => Err(ExecutionError::unexpected("GetConnection", &other)),
        }
    }

    pub fn get_or(&self, conn_id: &str, default: Connection) -> Result<Connection, ExecutionError> {
        match self.get(conn_id) {
            Err(err) if err.is_not_found_of(ErrorType::ConnectionNotFound) => Ok(default),
            other => other,
        }
    }
}

impl fmt::Debug for ConnectionAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionAccessor").finish_non_exhaustive()
    }
}
