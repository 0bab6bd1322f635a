//! Outlet event tracking.
//!
//! [`OutletEventAccessors`] maps the canonical key of every outlet the task
//! touches to one [`OutletEventHandle`]. Entries are created on first access;
//! references are resolved first, so two references to the same asset share
//! one handle.

use std::fmt;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use super::resolver::AssetRefResolver;
use crate::domain::asset::{AssetAlias, AssetLike, EntityKey};
use crate::domain::errors::ExecutionError;
use crate::domain::events::AssetAliasEvent;
use crate::sync::lock;

/// Snapshot of what the task recorded against one outlet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutletEventAccessor {
    pub key: EntityKey,
    pub extra: Map<String, Value>,
    pub asset_alias_events: Vec<AssetAliasEvent>,
}

/// Shared, mutable handle to one outlet's record.
#[derive(Clone)]
pub struct OutletEventHandle {
    inner: Arc<Mutex<OutletEventAccessor>>,
    resolver: Arc<AssetRefResolver>,
}

impl OutletEventHandle {
    pub fn new(key: EntityKey, extra: Map<String, Value>, resolver: Arc<AssetRefResolver>) -> Self {
        let accessor = OutletEventAccessor {
            key,
            extra,
            asset_alias_events: Vec::new(),
        };
        Self {
            inner: Arc::new(Mutex::new(accessor)),
            resolver,
        }
    }

    pub fn key(&self) -> EntityKey {
        lock(&self.inner).key.clone()
    }

    pub fn extra(&self) -> Map<String, Value> {
        lock(&self.inner).extra.clone()
    }

    pub fn set_extra(&self, extra: Map<String, Value>) {
        lock(&self.inner).extra = extra;
    }

    pub fn insert_extra(&self, key: impl Into<String>, value: impl Into<Value>) {
        lock(&self.inner).extra.insert(key.into(), value.into());
    }

    pub fn asset_alias_events(&self) -> Vec<AssetAliasEvent> {
        lock(&self.inner).asset_alias_events.clone()
    }

    pub fn snapshot(&self) -> OutletEventAccessor {
        lock(&self.inner).clone()
    }

    /// True when both handles point at the same record.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Attaches a concrete asset to this outlet.
    ///
    /// Only alias outlets record anything: an [`AssetAliasEvent`] pointing at
    /// the resolved asset, carrying `extra` if given and a copy of this
    /// outlet's own extra otherwise. On an asset outlet this does nothing.
    pub fn add(
        &self,
        asset: impl Into<AssetLike>,
        extra: Option<Map<String, Value>>,
    ) -> Result<(), ExecutionError> {
        let alias_name = match &lock(&self.inner).key {
            EntityKey::Alias(alias) => alias.name.clone(),
            EntityKey::Asset(_) => return Ok(()),
        };

        // Resolve before locking again; this may round trip.
        let dest_asset_key = self.resolver.resolve_asset(&asset.into())?;

        let mut inner = lock(&self.inner);
        let extra = extra.unwrap_or_else(|| inner.extra.clone());
        inner.asset_alias_events.push(AssetAliasEvent {
            source_alias_name: alias_name,
            dest_asset_key,
            extra,
        });
        Ok(())
    }
}

impl fmt::Debug for OutletEventHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*lock(&self.inner), f)
    }
}

pub struct OutletEventAccessors {
    resolver: Arc<AssetRefResolver>,
    entries: Mutex<IndexMap<EntityKey, OutletEventHandle>>,
}

impl OutletEventAccessors {
    pub fn new(resolver: Arc<AssetRefResolver>) -> Self {
        Self {
            resolver,
            entries: Mutex::new(IndexMap::new()),
        }
    }

    /// Returns the handle for `key`, creating an empty one on first access.
    pub fn get(&self, key: impl Into<AssetLike>) -> Result<OutletEventHandle, ExecutionError> {
        let key = self.resolver.resolve(&key.into())?;
        Ok(self.entry(key))
    }

    fn entry(&self, key: EntityKey) -> OutletEventHandle {
        let mut entries = lock(&self.entries);
        entries
            .entry(key.clone())
            .or_insert_with(|| OutletEventHandle::new(key, Map::new(), self.resolver.clone()))
            .clone()
    }

    /// Looks up by whatever parts of the asset identity are known.
    pub fn for_asset(
        &self,
        name: Option<&str>,
        uri: Option<&str>,
    ) -> Result<OutletEventHandle, ExecutionError> {
        self.get(AssetLike::from_parts(name, uri)?)
    }

    pub fn for_asset_alias(&self, name: &str) -> Result<OutletEventHandle, ExecutionError> {
        self.get(AssetAlias::new(name))
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        lock(&self.entries).contains_key(key)
    }

    /// Keys in first-access order.
    pub fn keys(&self) -> Vec<EntityKey> {
        lock(&self.entries).keys().cloned().collect()
    }

    pub fn handles(&self) -> Vec<OutletEventHandle> {
        lock(&self.entries).values().cloned().collect()
    }

    /// Everything recorded so far, in first-access order.
    pub fn snapshot(&self) -> Vec<OutletEventAccessor> {
        self.handles().iter().map(OutletEventHandle::snapshot).collect()
    }
}

impl fmt::Debug for OutletEventAccessors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.snapshot()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::{Asset, AssetUniqueKey};
    use crate::domain::messages::{AssetResult, ToTask};
    use crate::impls::{InMemorySupervisor, ScriptedComms};
    use serde_json::json;

    fn resolver_with(assets: &[Asset]) -> (Arc<InMemorySupervisor>, Arc<AssetRefResolver>) {
        let supervisor = InMemorySupervisor::new();
        for asset in assets {
            supervisor.add_asset(asset);
        }
        let supervisor = Arc::new(supervisor);
        let resolver = Arc::new(AssetRefResolver::new(supervisor.clone()));
        (supervisor, resolver)
    }

    fn extra(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn references_to_one_asset_share_a_handle() {
        let (supervisor, resolver) = resolver_with(&[Asset::new("test_asset", "s3://bucket/test")]);
        let outlets = OutletEventAccessors::new(resolver);

        let by_name = outlets.get(Asset::by_name("test_asset")).unwrap();
        assert_eq!(outlets.len(), 1);

        let by_uri = outlets.get(Asset::by_uri("s3://bucket/test")).unwrap();
        let direct = outlets.get(Asset::new("test_asset", "s3://bucket/test")).unwrap();
        assert!(by_name.ptr_eq(&by_uri));
        assert!(by_name.ptr_eq(&direct));
        assert_eq!(outlets.len(), 1);

        outlets.get(AssetAlias::new("alias")).unwrap();
        assert_eq!(outlets.len(), 2);
        assert_eq!(supervisor.request_count(), 2);
    }

    #[test]
    fn writes_through_any_handle_are_visible() {
        let (_, resolver) = resolver_with(&[]);
        let outlets = OutletEventAccessors::new(resolver);

        outlets.get(Asset::named("a")).unwrap().insert_extra("rows", 10);
        assert_eq!(outlets.get(Asset::named("a")).unwrap().extra(), extra(json!({"rows": 10})));
    }

    #[test]
    fn alias_add_records_events_with_extra_precedence() {
        let (_, resolver) = resolver_with(&[Asset::new("resolved", "s3://resolved")]);
        let outlets = OutletEventAccessors::new(resolver);
        let alias = outlets.for_asset_alias("my_alias").unwrap();
        alias.set_extra(extra(json!({"from": "accessor"})));

        alias.add(Asset::new("x", "s3://x"), None).unwrap();
        alias
            .add(Asset::by_name("resolved"), Some(extra(json!({"from": "call"}))))
            .unwrap();

        assert_eq!(
            alias.asset_alias_events(),
            vec![
                AssetAliasEvent {
                    source_alias_name: "my_alias".to_string(),
                    dest_asset_key: AssetUniqueKey::new("x", "s3://x"),
                    extra: extra(json!({"from": "accessor"})),
                },
                AssetAliasEvent {
                    source_alias_name: "my_alias".to_string(),
                    dest_asset_key: AssetUniqueKey::new("resolved", "s3://resolved"),
                    extra: extra(json!({"from": "call"})),
                },
            ]
        );
    }

    #[test]
    fn add_on_asset_outlet_is_a_no_op() {
        let comms = Arc::new(ScriptedComms::new());
        let resolver = Arc::new(AssetRefResolver::new(comms.clone()));
        let outlets = OutletEventAccessors::new(resolver);

        let outlet = outlets.get(Asset::named("a")).unwrap();
        outlet.add(Asset::by_name("whatever"), None).unwrap();

        assert!(outlet.asset_alias_events().is_empty());
        assert_eq!(comms.request_count(), 0);
    }

    #[test]
    fn failed_resolution_creates_no_entry() {
        let (_, resolver) = resolver_with(&[]);
        let outlets = OutletEventAccessors::new(resolver);

        let err = outlets.get(Asset::by_name("ghost")).unwrap_err();
        assert!(err.is_not_found());
        assert!(outlets.is_empty());
    }

    #[test]
    fn for_asset_picks_the_reference_form() {
        let comms = Arc::new(ScriptedComms::answering(ToTask::AssetResult(AssetResult {
            name: "n".to_string(),
            uri: "u".to_string(),
            group: "asset".to_string(),
            extra: Map::new(),
        })));
        let outlets = OutletEventAccessors::new(Arc::new(AssetRefResolver::new(comms.clone())));

        let full = outlets.for_asset(Some("n"), Some("u")).unwrap();
        assert_eq!(comms.request_count(), 0);
        let by_uri = outlets.for_asset(None, Some("u")).unwrap();
        assert_eq!(comms.request_count(), 1);
        assert!(full.ptr_eq(&by_uri));

        let err = outlets.for_asset(None, None).unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidReference(_)));
        assert_eq!(outlets.keys(), vec![EntityKey::Asset(AssetUniqueKey::new("n", "u"))]);
    }
}
