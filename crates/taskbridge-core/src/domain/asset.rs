//! Assets, aliases and the references that point at them.
//!
//! Task code may name an asset fully (`Asset`), by alias (`AssetAlias`), or
//! only partially (`AssetRef`: name-only or uri-only). Partial references are
//! turned into an [`AssetUniqueKey`] by the resolver; the unique keys are what
//! every accessor map is keyed by.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::errors::ExecutionError;

pub const DEFAULT_ASSET_GROUP: &str = "asset";

fn default_group() -> String {
    DEFAULT_ASSET_GROUP.to_string()
}

/// A concrete data asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    pub uri: String,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl Asset {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
            group: DEFAULT_ASSET_GROUP.to_string(),
            extra: Map::new(),
        }
    }

    /// Asset whose uri is its name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(name.clone(), name)
    }

    /// Asset whose name is its uri.
    pub fn from_uri(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        Self::new(uri.clone(), uri)
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = extra;
        self
    }

    /// Partial reference by name, resolved at runtime.
    pub fn by_name(name: impl Into<String>) -> AssetRef {
        AssetRef::Name(name.into())
    }

    /// Partial reference by uri, resolved at runtime.
    pub fn by_uri(uri: impl Into<String>) -> AssetRef {
        AssetRef::Uri(uri.into())
    }

    pub fn unique_key(&self) -> AssetUniqueKey {
        AssetUniqueKey::from_asset(self)
    }
}

/// A named group that resolves to zero or more assets at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAlias {
    pub name: String,
    #[serde(default = "default_group")]
    pub group: String,
}

impl AssetAlias {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: DEFAULT_ASSET_GROUP.to_string(),
        }
    }
}

/// A partial asset reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum AssetRef {
    Name(String),
    Uri(String),
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "asset ref (name={name})"),
            Self::Uri(uri) => write!(f, "asset ref (uri={uri})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetUniqueKey {
    pub name: String,
    pub uri: String,
}

impl AssetUniqueKey {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
        }
    }

    pub fn from_asset(asset: &Asset) -> Self {
        Self::new(asset.name.clone(), asset.uri.clone())
    }

    pub fn to_asset(&self) -> Asset {
        Asset::new(self.name.clone(), self.uri.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetAliasUniqueKey {
    pub name: String,
}

impl AssetAliasUniqueKey {
    pub fn from_alias(alias: &AssetAlias) -> Self {
        Self {
            name: alias.name.clone(),
        }
    }

    pub fn to_alias(&self) -> AssetAlias {
        AssetAlias::new(self.name.clone())
    }
}

/// Canonical identity of anything that can be an inlet or outlet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityKey {
    Asset(AssetUniqueKey),
    Alias(AssetAliasUniqueKey),
}

impl EntityKey {
    pub fn is_alias(&self) -> bool {
        matches!(self, Self::Alias(_))
    }
}

impl From<AssetUniqueKey> for EntityKey {
    fn from(key: AssetUniqueKey) -> Self {
        Self::Asset(key)
    }
}

impl From<AssetAliasUniqueKey> for EntityKey {
    fn from(key: AssetAliasUniqueKey) -> Self {
        Self::Alias(key)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asset(key) => write!(f, "asset (name={}, uri={})", key.name, key.uri),
            Self::Alias(key) => write!(f, "asset alias (name={})", key.name),
        }
    }
}

/// Anything a task may declare as an inlet/outlet or use as an accessor key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLike {
    Asset(Asset),
    Alias(AssetAlias),
    Ref(AssetRef),
}

impl AssetLike {
    /// Picks the most specific form for the parts given: a full asset when
    /// both are known, otherwise a partial reference.
    pub fn from_parts(name: Option<&str>, uri: Option<&str>) -> Result<Self, ExecutionError> {
        match (name, uri) {
            (Some(name), Some(uri)) => Ok(Self::Asset(Asset::new(name, uri))),
            (Some(name), None) => Ok(Self::Ref(AssetRef::Name(name.to_string()))),
            (None, Some(uri)) => Ok(Self::Ref(AssetRef::Uri(uri.to_string()))),
            (None, None) => Err(ExecutionError::InvalidReference(
                "either name or uri is required".to_string(),
            )),
        }
    }
}

impl From<Asset> for AssetLike {
    fn from(asset: Asset) -> Self {
        Self::Asset(asset)
    }
}

impl From<AssetAlias> for AssetLike {
    fn from(alias: AssetAlias) -> Self {
        Self::Alias(alias)
    }
}

impl From<AssetRef> for AssetLike {
    fn from(reference: AssetRef) -> Self {
        Self::Ref(reference)
    }
}

impl fmt::Display for AssetLike {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asset(asset) => write!(f, "asset (name={}, uri={})", asset.name, asset.uri),
            Self::Alias(alias) => write!(f, "asset alias (name={})", alias.name),
            Self::Ref(reference) => reference.fmt(f),
        }
    }
}
