//! Ports - 実行時ロジックと外界の境界
//!
//! - `comms`: supervisor channel（blocking facade + async transport）
//! - `clock` / `id_generator`: テストで決定的な時刻とリクエスト ID
//! - `context_vars`: 差し替え可能な追加 context vars ポリシー

pub mod clock;
pub mod comms;
pub mod context_vars;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::comms::{SupervisorComms, SupervisorTransport};
pub use self::context_vars::{ContextVarsProvider, NoContextVars, StaticContextVars};
pub use self::id_generator::{IdGenerator, UlidGenerator};
