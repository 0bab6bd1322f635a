//! Impls - ポートの実装
//!
//! - **BlockingComms**: 任意の async transport 上の blocking channel
//! - **ChannelTransport**: tokio channel によるプロセス内 transport
//! - **InMemorySupervisor**: 開発・テスト用の fake control plane
//! - **ScriptedComms**: テスト用の固定応答

pub mod blocking_comms;
pub mod channel_transport;
pub mod inmem_supervisor;
pub mod scripted;

pub use self::blocking_comms::BlockingComms;
pub use self::channel_transport::{ChannelTransport, PendingRequest, channel};
pub use self::inmem_supervisor::InMemorySupervisor;
pub use self::scripted::ScriptedComms;
