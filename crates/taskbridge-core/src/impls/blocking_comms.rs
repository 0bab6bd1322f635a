//! BlockingComms - タスクコードが使う同期 supervisor channel
//!
//! async な [`SupervisorTransport`] を包み、各往復を専用の current-thread
//! runtime 上で完了まで駆動します。リクエストごとに新しい ID を振り、
//! それを返さない応答は拒否します。
//!
//! 別の tokio runtime の内側から呼んではいけません。
//!
//! # 学習ポイント
//! - `Builder::new_current_thread()` と `block_on` による sync/async の橋渡し
//! - timer などの runtime 資源は `block_on` の内側で作る

use std::fmt;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

use crate::config::SdkConfig;
use crate::domain::errors::CommsError;
use crate::domain::messages::{RequestFrame, ToSupervisor, ToTask};
use crate::ports::{IdGenerator, SupervisorComms, SupervisorTransport, SystemClock, UlidGenerator};

pub struct BlockingComms<T, G = UlidGenerator<SystemClock>> {
    transport: T,
    ids: G,
    runtime: Runtime,
    timeout: Duration,
}

impl<T: SupervisorTransport> BlockingComms<T> {
    pub fn new(transport: T) -> Result<Self, CommsError> {
        Self::with_config(transport, &SdkConfig::default())
    }

    pub fn with_config(transport: T, config: &SdkConfig) -> Result<Self, CommsError> {
        Self::with_id_generator(transport, UlidGenerator::default(), config)
    }
}

impl<T: SupervisorTransport, G: IdGenerator> BlockingComms<T, G> {
    pub fn with_id_generator(transport: T, ids: G, config: &SdkConfig) -> Result<Self, CommsError> {
        let runtime = Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(CommsError::Runtime)?;
        Ok(Self {
            transport,
            ids,
            runtime,
            timeout: config.request_timeout(),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: SupervisorTransport, G: IdGenerator> SupervisorComms for BlockingComms<T, G> {
    fn send(&self, request: ToSupervisor) -> Result<ToTask, CommsError> {
        let frame = RequestFrame {
            id: self.ids.generate_request_id(),
            body: request,
        };
        let expected = frame.id;
        tracing::debug!(request_id = %expected, request = frame.body.name(), "sending request to supervisor");

        let response = self
            .runtime
            // the timer must be created inside the runtime
            .block_on(async { tokio::time::timeout(self.timeout, self.transport.round_trip(frame)).await })
            .map_err(|_| CommsError::Timeout(self.timeout))??;

        if response.id != expected {
            tracing::warn!(request_id = %expected, response_id = %response.id, "dropping mismatched response");
            return Err(CommsError::Mismatched {
                expected,
                got: response.id,
            });
        }

        tracing::debug!(request_id = %expected, response = response.body.name(), "received supervisor response");
        Ok(response.body)
    }
}

impl<T, G> fmt::Debug for BlockingComms<T, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingComms")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
