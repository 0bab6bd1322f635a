use std::sync::Arc;

use anyhow::Context as _;
use chrono::{TimeZone, Utc};
use serde_json::{Map, json};
use taskbridge_core::app::{TaskRuntime, get_current_context};
use taskbridge_core::config::SdkConfig;
use taskbridge_core::domain::{
    Asset, AssetAlias, AssetEvent, AssetResult, ConnectionResult, SourceTaskInstance,
    TaskDeclaration, TaskIdentity,
};
use taskbridge_core::impls::{BlockingComms, InMemorySupervisor, channel};
use tracing_subscriber::EnvFilter;

fn load_config() -> anyhow::Result<SdkConfig> {
    match std::env::var_os("TASKBRIDGE_CONFIG") {
        Some(path) => SdkConfig::load(&path)
            .with_context(|| format!("loading config from {}", path.to_string_lossy())),
        None => Ok(SdkConfig::default()),
    }
}

fn seeded_supervisor() -> anyhow::Result<InMemorySupervisor> {
    let producer = SourceTaskInstance {
        dag_id: "ingest".to_string(),
        run_id: "scheduled__2017-05-21".to_string(),
        task_id: "load_orders".to_string(),
        map_index: -1,
    };
    let orders_event = AssetEvent {
        id: 1,
        asset: AssetResult {
            name: "orders".to_string(),
            uri: "s3://warehouse/orders".to_string(),
            group: "asset".to_string(),
            extra: Default::default(),
        },
        extra: Default::default(),
        source_dag_id: Some(producer.dag_id.clone()),
        source_run_id: Some(producer.run_id.clone()),
        source_task_id: Some(producer.task_id.clone()),
        source_map_index: Some(producer.map_index),
        source_aliases: vec![AssetAlias::new("daily")],
        timestamp: Utc
            .with_ymd_and_hms(2017, 5, 21, 0, 5, 0)
            .single()
            .context("invalid event timestamp")?,
    };

    Ok(InMemorySupervisor::new()
        .with_asset(&Asset::new("orders", "s3://warehouse/orders"))
        .with_asset(&Asset::new("report", "s3://warehouse/report"))
        .with_variable("greeting", "hello")
        .with_variable("limits", r#"{"max_rows": 1000}"#)
        .with_connection(ConnectionResult {
            conn_id: "warehouse".to_string(),
            conn_type: "postgres".to_string(),
            host: Some("db.internal".to_string()),
            port: Some(5432),
            extra: Some(r#"{"sslmode": "require"}"#.to_string()),
            ..ConnectionResult::default()
        })
        .with_xcom(producer, "return_value", json!({"rows": 42}))
        .with_asset_event(orders_event))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // (A) config and a supervisor served on its own thread
    let config = load_config()?;
    let supervisor = Arc::new(seeded_supervisor()?);
    let (transport, requests) = channel(16);
    let server = supervisor.clone().serve_in_thread(requests)?;

    // (B) runtime over the blocking channel
    let runtime = TaskRuntime::builder()
        .comms(BlockingComms::with_config(transport, &config)?)
        .config(config)
        .build()?;

    // (C) context of one attempt
    let identity = TaskIdentity::new("report", "manual__2017-05-21", "build_report", 1)
        .with_logical_date(
            Utc.with_ymd_and_hms(2017, 5, 21, 0, 0, 0)
                .single()
                .context("invalid logical date")?,
        )
        .with_owners(["data-eng"])
        .with_emails(["data-eng@example.com"]);
    let declaration = TaskDeclaration::new()
        .inlet(Asset::by_name("orders"))
        .inlet(AssetAlias::new("daily"))
        .outlet(Asset::new("report", "s3://warehouse/report"))
        .outlet(AssetAlias::new("published"));
    let context = runtime.template_context(identity, &declaration, Vec::new())?;

    // (D) task body
    let env = runtime.run(context, |context| -> anyhow::Result<_> {
        let accessors = context.accessors().context("context has no accessors")?;
        println!("greeting: {}", accessors.var.get("greeting")?);
        println!("limits: {}", accessors.var_json.get("limits")?);
        println!("fallback: {}", accessors.var.get_or("missing", "default")?);

        let conn = accessors.conn.get("warehouse")?;
        println!("connection: {conn:?} extra={:?}", conn.extra_dejson());

        for event in accessors.inlet_events.get(0usize)? {
            println!("inlet event {} on {}", event.id, event.asset.name);
            if let Some(source) = event.source_task_instance() {
                println!("  produced by {source}: {}", source.xcom_pull(runtime.comms().as_ref())?);
            }
        }
        println!("aliased events: {}", accessors.inlet_events.for_asset_alias("daily")?.len());

        let published = accessors.outlet_events.for_asset_alias("published")?;
        let mut extra = Map::new();
        extra.insert("rows".to_string(), json!(42));
        published.add(Asset::by_name("report"), Some(extra))?;
        accessors.outlet_events.get(Asset::by_uri("s3://warehouse/report"))?.insert_extra("rows", 42);

        let current = get_current_context()?;
        Ok(runtime.airflow_vars(&current, true)?)
    })?;

    // (E) what a subprocess would receive
    for (key, value) in &env {
        println!("{key}={value}");
    }
    tracing::info!(
        exported = env.len(),
        supervisor_requests = supervisor.request_count(),
        "task attempt finished"
    );

    // the server thread exits once the last transport handle is gone
    drop(runtime);
    server
        .join()
        .map_err(|_| anyhow::anyhow!("supervisor thread panicked"))?;
    Ok(())
}
