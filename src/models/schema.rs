use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::alias::AliasDefinition;
use super::mapping::RootMapping;
use super::settings::{IndexSettings, deserialize_settings};

/// Mapping and settings of one index, as `{"mappings": ..., "settings": ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSchema {
    #[serde(default)]
    pub mappings: RootMapping,
    #[serde(default, deserialize_with = "deserialize_settings")]
    pub settings: IndexSettings,
}

/// The fully resolved schema an application wants for one logical index.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredIndex {
    pub name: String,
    pub schema: IndexSchema,
}

impl DesiredIndex {
    pub fn new(name: impl Into<String>, schema: IndexSchema) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// One concrete index as returned by `GET /<index>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedIndex {
    #[serde(default)]
    pub aliases: BTreeMap<String, AliasDefinition>,
    #[serde(flatten)]
    pub schema: IndexSchema,
}

/// The store's metadata for every concrete index a set of names resolved to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataView {
    indexes: BTreeMap<String, ObservedIndex>,
}

impl MetadataView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, index: ObservedIndex) {
        self.indexes.insert(name.into(), index);
    }

    pub fn extend(&mut self, other: MetadataView) {
        self.indexes.extend(other.indexes);
    }

    pub fn get(&self, name: &str) -> Option<&ObservedIndex> {
        self.indexes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indexes.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.indexes.keys().map(String::as_str)
    }

    /// Concrete indexes carrying the given alias.
    pub fn indexes_with_alias(&self, alias: &str) -> BTreeSet<String> {
        self.indexes
            .iter()
            .filter(|(_, index)| index.aliases.contains_key(alias))
            .map(|(name, _)| name.clone())
            .collect()
    }
}
