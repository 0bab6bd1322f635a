//! InletEventsAccessors - asset events for the inlets a task declared.
//!
//! References among the declared inlets are resolved once, eagerly and in
//! declaration order, when the accessors are built. Event bodies are never
//! cached: every `get` is one fresh round trip.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::resolver::AssetRefResolver;
use crate::domain::asset::{Asset, AssetAlias, AssetLike, AssetRef, EntityKey};
use crate::domain::errors::ExecutionError;
use crate::domain::events::AssetEvent;
use crate::domain::messages::{ToSupervisor, ToTask};

/// How a caller addresses one inlet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InletKey {
    Position(usize),
    Entity(AssetLike),
}

impl From<usize> for InletKey {
    fn from(index: usize) -> Self {
        Self::Position(index)
    }
}

impl From<AssetLike> for InletKey {
    fn from(entity: AssetLike) -> Self {
        Self::Entity(entity)
    }
}

impl From<Asset> for InletKey {
    fn from(asset: Asset) -> Self {
        Self::Entity(asset.into())
    }
}

impl From<AssetAlias> for InletKey {
    fn from(alias: AssetAlias) -> Self {
        Self::Entity(alias.into())
    }
}

impl From<AssetRef> for InletKey {
    fn from(reference: AssetRef) -> Self {
        Self::Entity(reference.into())
    }
}

pub struct InletEventsAccessors {
    inlets: Vec<AssetLike>,
    resolved: Vec<EntityKey>,
    positions: HashMap<EntityKey, Vec<usize>>,
    resolver: Arc<AssetRefResolver>,
}

impl InletEventsAccessors {
    pub fn new(inlets: Vec<AssetLike>, resolver: Arc<AssetRefResolver>) -> Result<Self, ExecutionError> {
        let resolved = inlets
            .iter()
            .map(|inlet| resolver.resolve(inlet))
            .collect::<Result<Vec<_>, _>>()?;

        let mut positions: HashMap<EntityKey, Vec<usize>> = HashMap::new();
        for (position, key) in resolved.iter().enumerate() {
            positions.entry(key.clone()).or_default().push(position);
        }

        Ok(Self {
            inlets,
            resolved,
            positions,
            resolver,
        })
    }

    pub fn len(&self) -> usize {
        self.inlets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inlets.is_empty()
    }

    /// Declared inlets, in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, AssetLike> {
        self.inlets.iter()
    }

    /// Canonical keys of the declared inlets, in declaration order.
    pub fn keys(&self) -> &[EntityKey] {
        &self.resolved
    }

    pub fn positions_of(&self, key: &EntityKey) -> &[usize] {
        self.positions.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Events of one declared inlet, in production order.
    pub fn get(&self, key: impl Into<InletKey>) -> Result<Vec<AssetEvent>, ExecutionError> {
        let inlet = match key.into() {
            InletKey::Position(index) => self.inlets.get(index).cloned().ok_or(ExecutionError::IndexOutOfRange {
                index,
                len: self.inlets.len(),
            })?,
            InletKey::Entity(entity) => {
                let resolved = self.resolver.resolve(&entity)?;
                if !self.positions.contains_key(&resolved) {
                    return Err(ExecutionError::UndeclaredInlet(entity.to_string()));
                }
                // queried with the caller's form, not the declared one
                entity
            }
        };
        self.fetch_events(&inlet)
    }

    /// Looks up by whatever parts of the asset identity are known.
    pub fn for_asset(&self, name: Option<&str>, uri: Option<&str>) -> Result<Vec<AssetEvent>, ExecutionError> {
        self.get(AssetLike::from_parts(name, uri)?)
    }

    pub fn for_asset_alias(&self, name: &str) -> Result<Vec<AssetEvent>, ExecutionError> {
        self.get(AssetAlias::new(name))
    }

    fn fetch_events(&self, inlet: &AssetLike) -> Result<Vec<AssetEvent>, ExecutionError> {
        let request = match inlet {
            AssetLike::Asset(asset) => ToSupervisor::GetAssetEventByAsset {
                name: Some(asset.name.clone()),
                uri: Some(asset.uri.clone()),
            },
            AssetLike::Ref(AssetRef::Name(name)) => ToSupervisor::GetAssetEventByAsset {
                name: Some(name.clone()),
                uri: None,
            },
            AssetLike::Ref(AssetRef::Uri(uri)) => ToSupervisor::GetAssetEventByAsset {
                name: None,
                uri: Some(uri.clone()),
            },
            AssetLike::Alias(alias) => ToSupervisor::GetAssetEventByAssetAlias {
                alias_name: alias.name.clone(),
            },
        };
        let request_name = request.name();

        match self.resolver.comms().send(request)? {
            ToTask::AssetEventsResult(result) => Ok(result.asset_events),
            ToTask::ErrorResponse(err) => Err(err.into_error(format!("events of {inlet}"))),
            other => Err(ExecutionError::unexpected(request_name, &other)),
        }
    }
}

impl<'a> IntoIterator for &'a InletEventsAccessors {
    type Item = &'a AssetLike;
    type IntoIter = std::slice::Iter<'a, AssetLike>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for InletEventsAccessors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InletEventsAccessors")
            .field("inlets", &self.inlets)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::messages::AssetResult;
    use crate::impls::{InMemorySupervisor, ScriptedComms};
    use chrono::{TimeZone, Utc};
    use serde_json::Map;

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
            source_dag_id: Some("d1".to_string()),
            source_run_id: Some("r1".to_string()),
            source_task_id: Some("t1".to_string()),
            source_map_index: Some(-1),
            source_aliases: aliases.iter().map(|alias| AssetAlias::new(*alias)).collect(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, minute, 0).unwrap(),
        }
    }

    fn supervisor() -> Arc<InMemorySupervisor> {
        Arc::new(
            InMemorySupervisor::new()
                .with_asset(&Asset::named("1"))
                .with_asset_event(event(1, "1", 1, &[]))
                .with_asset_event(event(2, "1", 5, &["a"]))
                .with_asset_event(event(3, "2", 6, &[])),
        )
    }

    fn ids(events: &[AssetEvent]) -> Vec<i64> {
        events.iter().map(|event| event.id).collect()
    }

    #[test]
    fn events_by_asset_alias_and_position() {
        let supervisor = supervisor();
        let resolver = Arc::new(AssetRefResolver::new(supervisor.clone()));
        let inlets = InletEventsAccessors::new(
            vec![Asset::named("1").into(), AssetAlias::new("a").into()],
            resolver,
        )
        .unwrap();
        assert_eq!(supervisor.request_count(), 0);

        assert_eq!(ids(&inlets.get(Asset::named("1")).unwrap()), vec![1, 2]);
        assert_eq!(ids(&inlets.get(AssetAlias::new("a")).unwrap()), vec![2]);
        assert_eq!(ids(&inlets.get(0usize).unwrap()), vec![1, 2]);
        assert_eq!(supervisor.request_count(), 3);

        let err = inlets.get(5usize).unwrap_err();
        assert!(matches!(err, ExecutionError::IndexOutOfRange { index: 5, len: 2 }));
    }

    #[test]
    fn references_are_resolved_eagerly_and_in_order() {
        let supervisor = supervisor();
        let resolver = Arc::new(AssetRefResolver::new(supervisor.clone()));
        let declared: Vec<AssetLike> = vec![
            AssetAlias::new("a").into(),
            Asset::by_name("1").into(),
            Asset::by_uri("1").into(),
        ];
        let inlets = InletEventsAccessors::new(declared.clone(), resolver).unwrap();

        assert_eq!(
            supervisor.requests(),
            vec![
                ToSupervisor::GetAssetByName { name: "1".to_string() },
                ToSupervisor::GetAssetByUri { uri: "1".to_string() },
            ]
        );
        assert_eq!(inlets.iter().cloned().collect::<Vec<_>>(), declared);
        assert_eq!(inlets.len(), 3);
        assert_eq!(inlets.positions_of(&Asset::named("1").unique_key().into()), &[1, 2]);
    }

    #[test]
    fn references_query_with_the_known_parts_only() {
        let comms = Arc::new(ScriptedComms::new());
        comms.push(ToTask::AssetResult(AssetResult {
            name: "1".to_string(),
            uri: "s3://1".to_string(),
            group: "asset".to_string(),
            extra: Map::new(),
        }));
        comms.respond_always(ToTask::AssetEventsResult(Default::default()));
        let resolver = Arc::new(AssetRefResolver::new(comms.clone()));
        let inlets = InletEventsAccessors::new(vec![Asset::by_name("1").into()], resolver).unwrap();

        inlets.get(Asset::by_name("1")).unwrap();
        inlets.get(0usize).unwrap();
        inlets.get(Asset::new("1", "s3://1")).unwrap();

        let queries = comms.requests().split_off(1);
        assert_eq!(
            queries,
            vec![
                ToSupervisor::GetAssetEventByAsset {
                    name: Some("1".to_string()),
                    uri: None,
                },
                ToSupervisor::GetAssetEventByAsset {
                    name: Some("1".to_string()),
                    uri: None,
                },
                ToSupervisor::GetAssetEventByAsset {
                    name: Some("1".to_string()),
                    uri: Some("s3://1".to_string()),
                },
            ]
        );
    }

    #[test]
    fn undeclared_keys_are_rejected_without_a_query() {
        let supervisor = supervisor();
        let resolver = Arc::new(AssetRefResolver::new(supervisor.clone()));
        let inlets = InletEventsAccessors::new(vec![Asset::named("1").into()], resolver).unwrap();

        let err = inlets.get(AssetAlias::new("a")).unwrap_err();
        assert!(matches!(err, ExecutionError::UndeclaredInlet(_)));
        assert_eq!(supervisor.request_count(), 0);
    }

    #[test]
    fn source_task_instance_of_inlet_events() {
        let supervisor = supervisor();
        let resolver = Arc::new(AssetRefResolver::new(supervisor.clone()));
        let inlets = InletEventsAccessors::new(vec![AssetAlias::new("a").into()], resolver).unwrap();

        let events = inlets.for_asset_alias("a").unwrap();
        let source = events[0].source_task_instance().unwrap();
        assert_eq!(source.to_string(), "d1/r1/t1[-1]");
    }

    #[test]
    fn unresolvable_declared_reference_fails_construction() {
        let resolver = Arc::new(AssetRefResolver::new(supervisor()));
        let err = InletEventsAccessors::new(vec![Asset::by_name("ghost").into()], resolver).unwrap_err();
        assert!(err.is_not_found());
    }
}
