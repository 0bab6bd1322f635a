//! TaskRuntime - 1 回の task attempt が解決するものすべての所有者
//!
//! supervisor channel、参照 resolver（解決キャッシュ）、追加 context vars
//! ポリシー、設定を保持します。グローバル状態はありません。
//! 複数の attempt を抱えるプロセスは attempt ごとに runtime を作ります。

use std::fmt;
use std::sync::Arc;

use chrono::SecondsFormat;
use indexmap::IndexMap;

use super::airflow_vars::context_to_airflow_vars;
use super::builder::RuntimeBuilder;
use super::connections::ConnectionAccessor;
use super::context::{Context, ContextAccessors};
use super::inlets::InletEventsAccessors;
use super::outlets::OutletEventAccessors;
use super::resolver::AssetRefResolver;
use super::stack::{ContextScope, ContextStack, set_current_context};
use super::triggering::TriggeringAssetEventsAccessor;
use super::variables::VariableAccessor;
use crate::config::SdkConfig;
use crate::domain::asset::AssetLike;
use crate::domain::errors::ExecutionError;
use crate::domain::events::AssetEvent;
use crate::domain::task::{TaskDeclaration, TaskIdentity};
use crate::ports::{ContextVarsProvider, SupervisorComms};

pub struct TaskRuntime {
    comms: Arc<dyn SupervisorComms>,
    resolver: Arc<AssetRefResolver>,
    context_vars: Arc<dyn ContextVarsProvider>,
    contexts: ContextStack,
    config: SdkConfig,
}

impl TaskRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub(crate) fn from_parts(
        comms: Arc<dyn SupervisorComms>,
        resolver: Arc<AssetRefResolver>,
        context_vars: Arc<dyn ContextVarsProvider>,
        config: SdkConfig,
    ) -> Self {
        Self {
            comms,
            resolver,
            context_vars,
            contexts: ContextStack::new(),
            config,
        }
    }

    pub fn comms(&self) -> &Arc<dyn SupervisorComms> {
        &self.comms
    }

    pub fn resolver(&self) -> &Arc<AssetRefResolver> {
        &self.resolver
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    /// Builds the context of one attempt.
    ///
    /// Inlet references are resolved here, so an unresolvable inlet fails the
    /// attempt before task code runs. Directly declared outlets get an empty
    /// entry up front; referenced outlets are created on first access.
    pub fn template_context(
        &self,
        identity: TaskIdentity,
        declaration: &TaskDeclaration,
        triggering_events: Vec<AssetEvent>,
    ) -> Result<Context, ExecutionError> {
        let inlet_events = InletEventsAccessors::new(declaration.inlets.clone(), self.resolver.clone())?;

        let outlet_events = OutletEventAccessors::new(self.resolver.clone());
        for outlet in &declaration.outlets {
            if !matches!(outlet, AssetLike::Ref(_)) {
                outlet_events.get(outlet.clone())?;
            }
        }

        let accessors = ContextAccessors {
            var: VariableAccessor::new(self.comms.clone(), false),
            var_json: VariableAccessor::new(self.comms.clone(), true),
            conn: ConnectionAccessor::new(self.comms.clone()),
            inlet_events: Arc::new(inlet_events),
            outlet_events: Arc::new(outlet_events),
            triggering_asset_events: Arc::new(TriggeringAssetEventsAccessor::build(
                triggering_events,
                self.resolver.clone(),
            )),
        };

        let mut context = Context::new()
            .with_entry("dag_id", identity.dag_id.clone())
            .with_entry("run_id", identity.run_id.clone())
            .with_entry("task_id", identity.task_id.clone())
            .with_entry("try_number", identity.try_number)
            .with_entry("map_index", identity.map_index);
        if let Some(logical_date) = identity.logical_date {
            context = context
                .with_entry("ds", logical_date.format("%Y-%m-%d").to_string())
                .with_entry("ds_nodash", logical_date.format("%Y%m%d").to_string())
                .with_entry("ts", logical_date.to_rfc3339_opts(SecondsFormat::AutoSi, false))
                .with_entry("ts_nodash", logical_date.format("%Y%m%dT%H%M%S").to_string());
        }

        tracing::debug!(
            dag_id = %identity.dag_id,
            task_id = %identity.task_id,
            inlets = declaration.inlets.len(),
            outlets = declaration.outlets.len(),
            "template context built"
        );
        Ok(context.with_identity(identity).with_accessors(accessors))
    }

    /// Runs `f` with `context` as this thread's current context.
    pub fn run<R>(&self, context: impl Into<Arc<Context>>, f: impl FnOnce(&Context) -> R) -> R {
        let context = context.into();
        let _guard = set_current_context(context.clone());
        f(&context)
    }

    /// Pushes `context` onto this runtime's own stack.
    pub fn enter(&self, context: impl Into<Arc<Context>>) -> ContextScope<'_> {
        self.contexts.push(context)
    }

    /// Innermost context entered through [`enter`](Self::enter).
    pub fn current_context(&self) -> Result<Arc<Context>, ExecutionError> {
        self.contexts.current()
    }

    pub fn airflow_vars(
        &self,
        context: &Context,
        in_env_var_format: bool,
    ) -> Result<IndexMap<String, String>, ExecutionError> {
        context_to_airflow_vars(context, self.context_vars.as_ref(), in_env_var_format)
    }
}

impl fmt::Debug for TaskRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRuntime")
            .field("resolver", &self.resolver)
            .field("contexts", &self.contexts.depth())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::get_current_context;
    use crate::domain::asset::{Asset, AssetAlias, AssetUniqueKey};
    use crate::domain::messages::{AssetResult, ConnectionResult, ToSupervisor};
    use crate::domain::events::SourceTaskInstance;
    use crate::impls::InMemorySupervisor;
    use crate::ports::NoContextVars;
    use chrono::{TimeZone, Utc};
    use serde_json::{Map, json};

    fn event(id: i64, name: &str, minute: u32, aliases: &[&str]) -> AssetEvent {
        AssetEvent {
            id,
            asset: AssetResult {
                name: name.to_string(),
                uri: name.to_string(),
                group: "asset".to_string(),
                extra: Map::new(),
            },
            extra: Map::new(),
            source_dag_id: Some("producer".to_string()),
            source_run_id: Some("run".to_string()),
            source_task_id: Some("emit".to_string()),
            source_map_index: Some(-1),
            source_aliases: aliases.iter().map(|alias| AssetAlias::new(*alias)).collect(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, minute, 0).unwrap(),
        }
    }

    fn supervisor() -> Arc<InMemorySupervisor> {
        let producer = SourceTaskInstance {
            dag_id: "producer".to_string(),
            run_id: "run".to_string(),
            task_id: "emit".to_string(),
            map_index: -1,
        };
        Arc::new(
            InMemorySupervisor::new()
                .with_asset(&Asset::new("orders", "s3://warehouse/orders"))
                .with_variable("greeting", "hello")
                .with_connection(ConnectionResult {
                    conn_id: "db".to_string(),
                    conn_type: "postgres".to_string(),
                    extra: Some("not json".to_string()),
                    ..ConnectionResult::default()
                })
                .with_asset_event(event(1, "1", 1, &[]))
                .with_asset_event(event(2, "1", 5, &["a"]))
                .with_asset_event(event(3, "2", 6, &[]))
                .with_xcom(producer, "return_value", json!({"rows": 3})),
        )
    }

    fn runtime(supervisor: Arc<InMemorySupervisor>) -> TaskRuntime {
        TaskRuntime::builder()
            .shared_comms(supervisor)
            .context_vars(NoContextVars)
            .build()
            .unwrap()
    }

    fn identity() -> TaskIdentity {
        TaskIdentity::new("dag", "manual__1", "consume", 1)
            .with_logical_date(Utc.with_ymd_and_hms(2017, 5, 21, 0, 0, 0).unwrap())
    }

    #[test]
    fn context_exposes_every_accessor() {
        let supervisor = supervisor();
        let runtime = runtime(supervisor.clone());
        let declaration = TaskDeclaration::new()
            .inlet(Asset::named("1"))
            .inlet(AssetAlias::new("a"))
            .outlet(Asset::by_name("orders"))
            .outlet(AssetAlias::new("out"));

        let context = runtime
            .template_context(identity(), &declaration, vec![event(2, "1", 5, &["a"])])
            .unwrap();
        assert_eq!(supervisor.request_count(), 0);
        assert_eq!(context.get("ds"), Some(&json!("2017-05-21")));
        assert_eq!(context.get("ts_nodash"), Some(&json!("20170521T000000")));

        let accessors = context.accessors().unwrap();
        assert_eq!(accessors.var.get("greeting").unwrap(), json!("hello"));
        assert_eq!(accessors.var.get_or("missing", "D").unwrap(), json!("D"));
        assert!(accessors.var.get("missing").unwrap_err().is_not_found());
        assert!(accessors.conn.get("db").unwrap().extra_dejson().is_empty());

        let inlets = &accessors.inlet_events;
        let by_asset: Vec<i64> = inlets.get(Asset::named("1")).unwrap().iter().map(|e| e.id).collect();
        let by_alias: Vec<i64> = inlets.get(AssetAlias::new("a")).unwrap().iter().map(|e| e.id).collect();
        assert_eq!(by_asset, vec![1, 2]);
        assert_eq!(by_alias, vec![2]);
        assert!(matches!(
            inlets.get(5usize),
            Err(ExecutionError::IndexOutOfRange { index: 5, len: 2 })
        ));

        let triggering = &accessors.triggering_asset_events;
        assert_eq!(triggering.get(AssetAlias::new("a")).unwrap().len(), 1);
        let pulled = triggering.get(Asset::named("1")).unwrap()[0]
            .source_task_instance()
            .unwrap()
            .xcom_pull(runtime.comms().as_ref())
            .unwrap();
        assert_eq!(pulled, json!({"rows": 3}));
    }

    #[test]
    fn outlets_track_alias_fan_out() {
        let supervisor = supervisor();
        let runtime = runtime(supervisor.clone());
        let declaration = TaskDeclaration::new()
            .outlet(Asset::new("orders", "s3://warehouse/orders"))
            .outlet(AssetAlias::new("out"));
        let context = runtime.template_context(identity(), &declaration, Vec::new()).unwrap();
        let outlets = &context.accessors().unwrap().outlet_events;
        assert_eq!(outlets.len(), 2);

        let orders = outlets.get(Asset::by_uri("s3://warehouse/orders")).unwrap();
        orders.insert_extra("rows", 3);
        assert_eq!(outlets.len(), 2);

        outlets
            .for_asset_alias("out")
            .unwrap()
            .add(Asset::by_name("orders"), None)
            .unwrap();
        let recorded = outlets.for_asset_alias("out").unwrap().asset_alias_events();
        assert_eq!(recorded[0].dest_asset_key, AssetUniqueKey::new("orders", "s3://warehouse/orders"));

        assert_eq!(
            supervisor.requests(),
            vec![
                ToSupervisor::GetAssetByUri {
                    uri: "s3://warehouse/orders".to_string()
                },
                ToSupervisor::GetAssetByName {
                    name: "orders".to_string()
                },
            ]
        );
    }

    #[test]
    fn run_sets_and_restores_current_context() {
        let runtime = runtime(supervisor());
        let context = runtime
            .template_context(identity(), &TaskDeclaration::new(), Vec::new())
            .unwrap();

        let task_id = runtime.run(context, |_| {
            get_current_context().unwrap().get("task_id").cloned()
        });
        assert_eq!(task_id, Some(json!("consume")));
        assert!(get_current_context().is_err());
    }

    #[test]
    fn runtime_stack_is_independent_of_the_thread_stack() {
        let runtime = runtime(supervisor());
        {
            let _scope = runtime.enter(Context::new().with_entry("id", 1));
            assert_eq!(runtime.current_context().unwrap().get("id"), Some(&json!(1)));
            assert!(get_current_context().is_err());
        }
        assert!(runtime.current_context().is_err());
    }

    #[test]
    fn unresolvable_inlet_fails_context_creation() {
        let runtime = runtime(supervisor());
        let declaration = TaskDeclaration::new().inlet(Asset::by_name("ghost"));
        let err = runtime
            .template_context(identity(), &declaration, Vec::new())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn airflow_vars_of_a_template_context() {
        let runtime = runtime(supervisor());
        let context = runtime
            .template_context(
                identity().with_owners(["owner1", "owner2"]),
                &TaskDeclaration::new(),
                Vec::new(),
            )
            .unwrap();

        let vars = runtime.airflow_vars(&context, true).unwrap();
        assert_eq!(vars["AIRFLOW_CTX_DAG_ID"], "dag");
        assert_eq!(vars["AIRFLOW_CTX_DAG_RUN_ID"], "manual__1");
        assert_eq!(vars["AIRFLOW_CTX_DAG_OWNER"], "owner1,owner2");
        assert_eq!(vars["AIRFLOW_CTX_LOGICAL_DATE"], "2017-05-21T00:00:00+00:00");
        assert!(!vars.contains_key("AIRFLOW_CTX_DAG_EMAIL"));
    }
}
