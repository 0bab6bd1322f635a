//! IdGenerator port.

use crate::domain::ids::RequestId;
use crate::ports::Clock;
use ulid::Ulid;

/// Generates request correlation ids.
pub trait IdGenerator: Send + Sync {
    fn generate_request_id(&self) -> RequestId;
}

/// ULID-based generator; the timestamp part comes from `C`.
#[derive(Debug, Clone, Default)]
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_request_id(&self) -> RequestId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        RequestId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}
