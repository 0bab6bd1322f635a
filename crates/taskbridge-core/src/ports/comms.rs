//! Supervisor comms ports
//!
//! タスクコードが見るのは [`SupervisorComms`] だけです。リクエストを
//! supervisor に渡して応答を返す blocking な呼び出しです。往復の運び方は
//! [`SupervisorTransport`] の関心事で、`impls::BlockingComms` が両者をつなぎます。
//!
//! # 学習ポイント
//! - `#[async_trait]` による async trait
//! - `Arc<T>` / `&T` への blanket impl

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::CommsError;
use crate::domain::messages::{RequestFrame, ResponseFrame, ToSupervisor, ToTask};

/// Blocking request/response channel to the supervisor.
///
/// # Contract
/// - One call is one round trip; nothing is retried.
/// - The calling thread does not run unrelated work while waiting.
/// - `Err` means the channel itself failed. Lookup misses come back as
///   `Ok(ToTask::ErrorResponse(..))`.
pub trait SupervisorComms: Send + Sync {
    fn send(&self, request: ToSupervisor) -> Result<ToTask, CommsError>;
}

impl<T: SupervisorComms + ?Sized> SupervisorComms for Arc<T> {
    fn send(&self, request: ToSupervisor) -> Result<ToTask, CommsError> {
        (**self).send(request)
    }
}

impl<T: SupervisorComms + ?Sized> SupervisorComms for &T {
    fn send(&self, request: ToSupervisor) -> Result<ToTask, CommsError> {
        (**self).send(request)
    }
}

/// Asynchronous carrier of request frames.
///
/// The response frame must echo the request frame's id.
#[async_trait]
pub trait SupervisorTransport: Send + Sync {
    async fn round_trip(&self, frame: RequestFrame) -> Result<ResponseFrame, CommsError>;
}
