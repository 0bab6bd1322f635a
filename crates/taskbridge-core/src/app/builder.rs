//! RuntimeBuilder - TaskRuntime の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（comms 未設定は最初のルックアップではなく build() で失敗）
//! - `Arc<dyn Trait>` によるポートの差し替え

use std::sync::Arc;

use super::resolver::AssetRefResolver;
use super::runtime::TaskRuntime;
use crate::config::SdkConfig;
use crate::ports::{ContextVarsProvider, StaticContextVars, SupervisorComms};

/// RuntimeBuilder は TaskRuntime を構築
///
/// # 使用例
/// ```ignore
/// let runtime = TaskRuntime::builder()
///     .comms(BlockingComms::with_config(transport, &config)?)
///     .config(config)
///     .build()?;
/// ```
#[derive(Default)]
pub struct RuntimeBuilder {
    comms: Option<Arc<dyn SupervisorComms>>,
    context_vars: Option<Arc<dyn ContextVarsProvider>>,
    config: SdkConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no supervisor comms configured; call `comms` before `build`")]
    MissingComms,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn comms(self, comms: impl SupervisorComms + 'static) -> Self {
        self.shared_comms(Arc::new(comms))
    }

    pub fn shared_comms(mut self, comms: Arc<dyn SupervisorComms>) -> Self {
        self.comms = Some(comms);
        self
    }

    /// Replaces the default provider, which exports `config.context_vars`.
    pub fn context_vars(mut self, provider: impl ContextVarsProvider + 'static) -> Self {
        self.context_vars = Some(Arc::new(provider));
        self
    }

    pub fn config(mut self, config: SdkConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<TaskRuntime, BuildError> {
        let comms = self.comms.ok_or(BuildError::MissingComms)?;
        let context_vars = self
            .context_vars
            .unwrap_or_else(|| Arc::new(StaticContextVars::from_config(&self.config)));
        let resolver = Arc::new(AssetRefResolver::new(comms.clone()));

        tracing::debug!(
            request_timeout_ms = self.config.request_timeout_ms,
            static_context_vars = self.config.context_vars.len(),
            "task runtime built"
        );
        Ok(TaskRuntime::from_parts(comms, resolver, context_vars, self.config))
    }
}
