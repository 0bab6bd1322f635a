//! App - 実行時のアプリケーション層
//!
//! このモジュールは、ports を組み合わせてタスクコードが触る面を実装します。
//!
//! # 主要コンポーネント
//! - **AssetRefResolver**: 参照解決（runtime 単位のキャッシュ付き）
//! - **VariableAccessor / ConnectionAccessor**: 遅延ルックアップとデフォルト値
//! - **OutletEventAccessors / InletEventsAccessors**: asset event の追跡
//! - **TriggeringAssetEventsAccessor**: run を起動した event
//! - **ContextStack**: 現在の context（明示的 or thread-local）
//! - **context_to_airflow_vars**: サブプロセス向けの平坦化
//! - **TaskRuntime**: 上記すべての所有とワイヤリング

pub mod airflow_vars;
pub mod builder;
pub mod connections;
pub mod context;
pub mod inlets;
pub mod outlets;
pub mod resolver;
pub mod runtime;
pub mod stack;
pub mod triggering;
pub mod variables;

pub use self::airflow_vars::{DEFAULT_FORMAT_PREFIX, ENV_VAR_FORMAT_PREFIX, context_to_airflow_vars};
pub use self::builder::{BuildError, RuntimeBuilder};
pub use self::connections::ConnectionAccessor;
pub use self::context::{Context, ContextAccessors};
pub use self::inlets::{InletEventsAccessors, InletKey};
pub use self::outlets::{OutletEventAccessor, OutletEventAccessors, OutletEventHandle};
pub use self::resolver::AssetRefResolver;
pub use self::runtime::TaskRuntime;
pub use self::stack::{
    ContextScope, ContextStack, CurrentContextGuard, get_current_context, set_current_context,
};
pub use self::triggering::TriggeringAssetEventsAccessor;
pub use self::variables::VariableAccessor;
