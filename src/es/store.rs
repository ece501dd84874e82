use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::StoreError;
use crate::models::{AliasDefinition, IndexSchema, IndexSettings, MetadataView, RootMapping};

/// Health of an index, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    Red,
    Yellow,
    Green,
}

impl IndexStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
        }
    }
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(Self::Red),
            "yellow" => Ok(Self::Yellow),
            "green" => Ok(Self::Green),
            other => Err(format!("unknown index status '{other}'")),
        }
    }
}

/// The read/write view of index metadata the schema manager works against.
///
/// Names passed to `exists` and `fetch_schema` may be concrete indexes or
/// aliases; names that resolve to nothing are skipped.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    async fn exists(&self, names: &[String]) -> Result<bool, StoreError>;

    /// Metadata of every concrete index the names resolve to.
    async fn fetch_schema(&self, names: &[String]) -> Result<MetadataView, StoreError>;

    async fn create_index(
        &self,
        index: &str,
        schema: &IndexSchema,
        aliases: &BTreeMap<String, AliasDefinition>,
    ) -> Result<(), StoreError>;

    async fn update_settings(&self, index: &str, settings: &IndexSettings) -> Result<(), StoreError>;

    async fn update_mapping(&self, index: &str, mapping: &RootMapping) -> Result<(), StoreError>;

    async fn close_index(&self, index: &str) -> Result<(), StoreError>;

    async fn open_index(&self, index: &str) -> Result<(), StoreError>;

    async fn put_alias(&self, index: &str, alias: &str, definition: &AliasDefinition) -> Result<(), StoreError>;

    async fn remove_alias(&self, index: &str, alias: &str) -> Result<(), StoreError>;

    async fn drop_index(&self, index: &str) -> Result<(), StoreError>;

    /// Waits until the index reaches at least `status`.
    async fn wait_for_status(&self, index: &str, status: IndexStatus, timeout: Duration) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_order() {
        assert!(IndexStatus::Green > IndexStatus::Yellow);
        assert!(IndexStatus::Yellow > IndexStatus::Red);
        assert_eq!("Yellow".parse(), Ok(IndexStatus::Yellow));
        assert!("blue".parse::<IndexStatus>().is_err());
    }
}
