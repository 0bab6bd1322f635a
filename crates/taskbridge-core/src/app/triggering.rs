//! TriggeringAssetEventsAccessor - the asset events that started this run.
//!
//! Each event is filed under its asset's key and under every alias it was
//! emitted through. Order within a key is the order the events were given in.

use std::sync::Arc;

use indexmap::IndexMap;

use super::resolver::AssetRefResolver;
use crate::domain::asset::{AssetLike, EntityKey};
use crate::domain::errors::ExecutionError;
use crate::domain::events::AssetEvent;

#[derive(Debug)]
pub struct TriggeringAssetEventsAccessor {
    events: IndexMap<EntityKey, Vec<AssetEvent>>,
    resolver: Arc<AssetRefResolver>,
}

impl TriggeringAssetEventsAccessor {
    pub fn build(events: Vec<AssetEvent>, resolver: Arc<AssetRefResolver>) -> Self {
        let mut by_key: IndexMap<EntityKey, Vec<AssetEvent>> = IndexMap::new();
        for event in events {
            for alias in event.alias_keys() {
                by_key.entry(alias.into()).or_default().push(event.clone());
            }
            by_key.entry(event.asset_key().into()).or_default().push(event);
        }
        Self {
            events: by_key,
            resolver,
        }
    }

    pub fn get(&self, key: impl Into<AssetLike>) -> Result<&[AssetEvent], ExecutionError> {
        let key = key.into();
        let resolved = self.resolver.resolve(&key)?;
        self.events
            .get(&resolved)
            .map(Vec::as_slice)
            .ok_or_else(|| ExecutionError::KeyNotFound(key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.events.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityKey, &[AssetEvent])> {
        self.events.iter().map(|(key, events)| (key, events.as_slice()))
    }
}
