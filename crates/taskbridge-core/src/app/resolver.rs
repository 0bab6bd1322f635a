//! AssetRefResolver - 部分的な asset 参照を unique key に解決
//!
//! # キャッシュ
//! 解決結果は resolver の生存期間中キャッシュされ、無効化されません。
//! 失敗はキャッシュしません。
//!
//! # ロック
//! 外側の map ロックは参照ごとの slot を取得・挿入する間だけ保持します。
//! slot 自身のロックは往復の間保持するため、同じ参照への同時ルックアップは
//! リクエスト 1 回にまとまり、無関係な参照は並行に進みます。
//!
//! # 学習ポイント
//! - `Mutex<HashMap<K, Arc<Mutex<Option<V>>>>>` による key 単位のロック
//! - ロック範囲の最小化

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::domain::asset::{AssetAliasUniqueKey, AssetLike, AssetRef, AssetUniqueKey, EntityKey};
use crate::domain::errors::ExecutionError;
use crate::domain::messages::{ToSupervisor, ToTask};
use crate::ports::SupervisorComms;
use crate::sync::lock;

type Slot = Arc<Mutex<Option<AssetUniqueKey>>>;

pub struct AssetRefResolver {
    comms: Arc<dyn SupervisorComms>,
    cache: Mutex<HashMap<AssetRef, Slot>>,
}

impl AssetRefResolver {
    pub fn new(comms: Arc<dyn SupervisorComms>) -> Self {
        Self {
            comms,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn comms(&self) -> &Arc<dyn SupervisorComms> {
        &self.comms
    }

    /// Resolves any inlet/outlet form to its canonical key.
    ///
    /// Assets and aliases carry their identity already and never cost a
    /// round trip.
    pub fn resolve(&self, target: &AssetLike) -> Result<EntityKey, ExecutionError> {
        match target {
            AssetLike::Asset(asset) => Ok(EntityKey::Asset(asset.unique_key())),
            AssetLike::Alias(alias) => Ok(EntityKey::Alias(AssetAliasUniqueKey::from_alias(alias))),
            AssetLike::Ref(reference) => self.resolve_ref(reference).map(EntityKey::Asset),
        }
    }

    /// Like [`resolve`](Self::resolve), but only concrete assets are accepted.
    pub fn resolve_asset(&self, target: &AssetLike) -> Result<AssetUniqueKey, ExecutionError> {
        match target {
            AssetLike::Asset(asset) => Ok(asset.unique_key()),
            AssetLike::Ref(reference) => self.resolve_ref(reference),
            AssetLike::Alias(alias) => Err(ExecutionError::InvalidReference(format!(
                "asset alias {} cannot be used where a concrete asset is required",
                alias.name
            ))),
        }
    }

    pub fn resolve_ref(&self, reference: &AssetRef) -> Result<AssetUniqueKey, ExecutionError> {
        let slot = {
            let mut cache = lock(&self.cache);
            cache.entry(reference.clone()).or_default().clone()
        };

        let mut resolved = lock(&slot);
        if let Some(key) = resolved.as_ref() {
            tracing::debug!(%reference, "asset reference cache hit");
            return Ok(key.clone());
        }

        tracing::debug!(%reference, "resolving asset reference");
        let key = self.fetch(reference)?;
        *resolved = Some(key.clone());
        Ok(key)
    }

    fn fetch(&self, reference: &AssetRef) -> Result<AssetUniqueKey, ExecutionError> {
        let (request, name) = match reference {
            AssetRef::Name(name) => (ToSupervisor::GetAssetByName { name: name.clone() }, "GetAssetByName"),
            AssetRef::Uri(uri) => (ToSupervisor::GetAssetByUri { uri: uri.clone() }, "GetAssetByUri"),
        };

        match self.comms.send(request)? {
            ToTask::AssetResult(asset) => Ok(asset.unique_key()),
            ToTask::ErrorResponse(err) => Err(err.into_error(reference)),
            other => Err(ExecutionError::unexpected(name, &other)),
        }
    }

    pub fn is_cached(&self, reference: &AssetRef) -> bool {
        let slot = lock(&self.cache).get(reference).cloned();
        slot.is_some_and(|slot| lock(&slot).is_some())
    }

    /// Number of references resolved so far.
    pub fn cached_len(&self) -> usize {
        let slots: Vec<Slot> = lock(&self.cache).values().cloned().collect();
        slots.iter().filter(|slot| lock(slot).is_some()).count()
    }

    /// Forgets every resolution. Meant for test fixtures that reuse a resolver.
    pub fn clear(&self) {
        lock(&self.cache).clear();
    }
}

impl fmt::Debug for AssetRefResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetRefResolver")
            .field("cached", &self.cached_len())
            .finish_non_exhaustive()
    }
}
