use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::AssetLike;

fn unmapped() -> i64 {
    -1
}

/// Identity of the running task attempt, supplied by the task definition layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskIdentity {
    pub dag_id: String,
    pub run_id: String,
    pub task_id: String,
    pub try_number: u32,
    /// `-1` for unmapped tasks.
    #[serde(default = "unmapped")]
    pub map_index: i64,
    #[serde(default)]
    pub logical_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub emails: Vec<String>,
}

impl TaskIdentity {
    pub fn new(
        dag_id: impl Into<String>,
        run_id: impl Into<String>,
        task_id: impl Into<String>,
        try_number: u32,
    ) -> Self {
        Self {
            dag_id: dag_id.into(),
            run_id: run_id.into(),
            task_id: task_id.into(),
            try_number,
            map_index: unmapped(),
            logical_date: None,
            owners: Vec::new(),
            emails: Vec::new(),
        }
    }

    pub fn with_logical_date(mut self, logical_date: DateTime<Utc>) -> Self {
        self.logical_date = Some(logical_date);
        self
    }

    pub fn with_owners<I, S>(mut self, owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.owners = owners.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_emails<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.emails = emails.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_map_index(mut self, map_index: i64) -> Self {
        self.map_index = map_index;
        self
    }
}

/// Inlets and outlets a task declares, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDeclaration {
    pub inlets: Vec<AssetLike>,
    pub outlets: Vec<AssetLike>,
}

impl TaskDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inlet(mut self, inlet: impl Into<AssetLike>) -> Self {
        self.inlets.push(inlet.into());
        self
    }

    pub fn outlet(mut self, outlet: impl Into<AssetLike>) -> Self {
        self.outlets.push(outlet.into());
        self
    }
}
