//! Flattening a context into variables for subprocesses.

use chrono::SecondsFormat;
use indexmap::IndexMap;
use serde_json::Value;

use super::context::Context;
use crate::domain::errors::ExecutionError;
use crate::domain::json_type_name;
use crate::ports::ContextVarsProvider;

pub const DEFAULT_FORMAT_PREFIX: &str = "airflow.ctx.";
pub const ENV_VAR_FORMAT_PREFIX: &str = "AIRFLOW_CTX_";

/// Returns the context's well-known fields plus the provider's extra vars as
/// a flat string map.
///
/// Keys are `airflow.ctx.<field>` by default, or `AIRFLOW_CTX_<FIELD>` with
/// `in_env_var_format`. Empty fields are left out. Provider vars must be
/// strings on both sides; built-in fields win over provider vars of the same
/// name.
pub fn context_to_airflow_vars(
    context: &Context,
    provider: &dyn ContextVarsProvider,
    in_env_var_format: bool,
) -> Result<IndexMap<String, String>, ExecutionError> {
    let mut vars = IndexMap::new();

    for (key, value) in provider.context_vars(context) {
        let Value::String(key) = key else {
            return Err(ExecutionError::NonStringContextKey(key.to_string()));
        };
        let Value::String(value) = value else {
            return Err(ExecutionError::NonStringContextValue {
                key,
                found: json_type_name(&value),
            });
        };
        vars.insert(policy_key(&key, in_env_var_format), value);
    }

    let Some(identity) = context.identity() else {
        return Ok(vars);
    };

    let fields = [
        ("dag_email", identity.emails.join(",")),
        ("dag_owner", identity.owners.join(",")),
        ("dag_id", identity.dag_id.clone()),
        ("task_id", identity.task_id.clone()),
        (
            "logical_date",
            identity
                .logical_date
                .map(|date| date.to_rfc3339_opts(SecondsFormat::AutoSi, false))
                .unwrap_or_default(),
        ),
        (
            "try_number",
            match identity.try_number {
                0 => String::new(),
                n => n.to_string(),
            },
        ),
        ("dag_run_id", identity.run_id.clone()),
    ];

    for (field, value) in fields {
        if value.is_empty() {
            continue;
        }
        let key = if in_env_var_format {
            format!("{ENV_VAR_FORMAT_PREFIX}{}", field.to_uppercase())
        } else {
            format!("{DEFAULT_FORMAT_PREFIX}{field}")
        };
        vars.insert(key, value);
    }

    Ok(vars)
}

/// Prefixes a provider key unless it already carries the prefix verbatim.
/// Only keys that get prefixed are upper-cased in env format.
fn policy_key(key: &str, in_env_var_format: bool) -> String {
    let prefix = if in_env_var_format {
        ENV_VAR_FORMAT_PREFIX
    } else {
        DEFAULT_FORMAT_PREFIX
    };
    if key.starts_with(prefix) {
        key.to_string()
    } else if in_env_var_format {
        format!("{prefix}{}", key.to_uppercase())
    } else {
        format!("{prefix}{key}")
    }
}
