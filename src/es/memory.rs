//! In-process [`SchemaStore`] that follows the metadata rules of Elasticsearch
//! closely enough to exercise every schema operation without a cluster.

use async_trait::async_trait;
use dashmap::DashMap;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::StoreError;
use crate::es::store::{IndexStatus, SchemaStore};
use crate::models::{
    AliasDefinition, FieldMapping, IndexSchema, IndexSettings, MetadataView, ObservedIndex, RootMapping,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Exists,
    FetchSchema,
    CreateIndex,
    UpdateSettings,
    UpdateMapping,
    CloseIndex,
    OpenIndex,
    PutAlias,
    RemoveAlias,
    DropIndex,
    WaitForStatus,
}

impl StoreOperation {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Exists | Self::FetchSchema | Self::WaitForStatus)
    }
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Exists => "exists",
            Self::FetchSchema => "fetch_schema",
            Self::CreateIndex => "create_index",
            Self::UpdateSettings => "update_settings",
            Self::UpdateMapping => "update_mapping",
            Self::CloseIndex => "close_index",
            Self::OpenIndex => "open_index",
            Self::PutAlias => "put_alias",
            Self::RemoveAlias => "remove_alias",
            Self::DropIndex => "drop_index",
            Self::WaitForStatus => "wait_for_status",
        };
        f.write_str(name)
    }
}

/// One call received by a [`MemoryStore`]. `target` is the index, or the
/// comma-joined names for lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub operation: StoreOperation,
    pub target: String,
}

#[derive(Debug, Clone)]
struct StoredIndex {
    schema: IndexSchema,
    aliases: BTreeMap<String, AliasDefinition>,
    open: bool,
    status: IndexStatus,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    indexes: DashMap<String, StoredIndex>,
    failures: DashMap<StoreOperation, String>,
    calls: Mutex<Vec<StoreCall>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an index as it would be returned by the store.
    pub fn insert_index(&self, name: &str, index: ObservedIndex) {
        self.indexes.insert(
            name.to_owned(),
            StoredIndex {
                schema: index.schema,
                aliases: index.aliases,
                open: true,
                status: IndexStatus::Green,
            },
        );
    }

    pub fn index(&self, name: &str) -> Option<ObservedIndex> {
        self.indexes.get(name).map(|stored| ObservedIndex {
            aliases: stored.aliases.clone(),
            schema: stored.schema.clone(),
        })
    }

    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn is_open(&self, name: &str) -> Option<bool> {
        self.indexes.get(name).map(|stored| stored.open)
    }

    /// Health the index reports from now on.
    pub fn set_status(&self, name: &str, status: IndexStatus) {
        if let Some(mut stored) = self.indexes.get_mut(name) {
            stored.status = status;
        }
    }

    /// Makes every later call of `operation` fail with a rejected request.
    pub fn fail_on(&self, operation: StoreOperation, reason: impl Into<String>) {
        self.failures.insert(operation, reason.into());
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn mutations(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.operation.is_mutation())
            .collect()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn record(&self, operation: StoreOperation, target: &str) -> Result<(), StoreError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(StoreCall {
                operation,
                target: target.to_owned(),
            });
        }
        match self.failures.get(&operation) {
            Some(reason) => Err(StoreError::Rejected(reason.value().clone())),
            None => Ok(()),
        }
    }

    /// Concrete indexes a name resolves to: the index itself or every holder of the alias.
    fn resolve(&self, name: &str) -> Vec<String> {
        if self.indexes.contains_key(name) {
            return vec![name.to_owned()];
        }
        self.indexes
            .iter()
            .filter(|entry| entry.aliases.contains_key(name))
            .map(|entry| entry.key().clone())
            .collect()
    }

    fn not_found(index: &str) -> StoreError {
        StoreError::Status {
            status: 404,
            body: format!("no such index [{index}]"),
        }
    }
}

#[async_trait]
impl SchemaStore for MemoryStore {
    async fn exists(&self, names: &[String]) -> Result<bool, StoreError> {
        self.record(StoreOperation::Exists, &names.join(","))?;
        Ok(names.iter().any(|name| !self.resolve(name).is_empty()))
    }

    async fn fetch_schema(&self, names: &[String]) -> Result<MetadataView, StoreError> {
        self.record(StoreOperation::FetchSchema, &names.join(","))?;
        let mut view = MetadataView::new();
        for index in names.iter().flat_map(|name| self.resolve(name)) {
            if let Some(observed) = self.index(&index) {
                view.insert(index, observed);
            }
        }
        Ok(view)
    }

    async fn create_index(
        &self,
        index: &str,
        schema: &IndexSchema,
        aliases: &BTreeMap<String, AliasDefinition>,
    ) -> Result<(), StoreError> {
        self.record(StoreOperation::CreateIndex, index)?;
        if !self.resolve(index).is_empty() {
            return Err(StoreError::Status {
                status: 400,
                body: format!("resource_already_exists_exception: index [{index}] already exists"),
            });
        }
        if let Some(alias) = aliases.keys().find(|alias| self.indexes.contains_key(*alias)) {
            return Err(StoreError::Status {
                status: 400,
                body: format!("invalid_alias_name_exception: an index exists with the same name as the alias [{alias}]"),
            });
        }

        let mut schema = schema.clone();
        schema.settings.number_of_shards.get_or_insert(1);
        schema.settings.number_of_replicas.get_or_insert(1);
        self.indexes.insert(
            index.to_owned(),
            StoredIndex {
                schema,
                aliases: aliases.clone(),
                open: true,
                status: IndexStatus::Green,
            },
        );
        Ok(())
    }

    async fn update_settings(&self, index: &str, settings: &IndexSettings) -> Result<(), StoreError> {
        self.record(StoreOperation::UpdateSettings, index)?;
        let mut stored = self.indexes.get_mut(index).ok_or_else(|| Self::not_found(index))?;

        if let Some(shards) = settings.number_of_shards {
            if stored.schema.settings.number_of_shards != Some(shards) {
                return Err(StoreError::Status {
                    status: 400,
                    body: "illegal_argument_exception: final index setting [index.number_of_shards], not updateable"
                        .to_owned(),
                });
            }
        }
        if !settings.analysis.is_empty() && stored.open {
            return Err(StoreError::Status {
                status: 400,
                body: format!(
                    "illegal_argument_exception: Can't update non dynamic settings [[index.analysis]] for open indices [{index}]"
                ),
            });
        }

        let current = &mut stored.schema.settings;
        if settings.number_of_replicas.is_some() {
            current.number_of_replicas = settings.number_of_replicas;
        }
        if settings.max_result_window.is_some() {
            current.max_result_window = settings.max_result_window;
        }
        current.analysis.merge_from(settings.analysis.clone());
        for (key, value) in settings.custom_flat() {
            current.set_custom(&key, value);
        }
        Ok(())
    }

    async fn update_mapping(&self, index: &str, mapping: &RootMapping) -> Result<(), StoreError> {
        self.record(StoreOperation::UpdateMapping, index)?;
        let mut stored = self.indexes.get_mut(index).ok_or_else(|| Self::not_found(index))?;
        let current = &mut stored.schema.mappings;

        // Validate everything before touching the stored mapping.
        check_types(&current.properties, &mapping.properties, "")?;

        if mapping.dynamic.is_some() {
            current.dynamic = mapping.dynamic;
        }
        merge_properties(&mut current.properties, &mapping.properties);
        for template in &mapping.dynamic_templates {
            match current.dynamic_templates.iter_mut().find(|t| t.name == template.name) {
                Some(existing) => *existing = template.clone(),
                None => current.dynamic_templates.push(template.clone()),
            }
        }
        for (key, value) in &mapping.extra {
            current.extra.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn close_index(&self, index: &str) -> Result<(), StoreError> {
        self.record(StoreOperation::CloseIndex, index)?;
        let mut stored = self.indexes.get_mut(index).ok_or_else(|| Self::not_found(index))?;
        stored.open = false;
        Ok(())
    }

    async fn open_index(&self, index: &str) -> Result<(), StoreError> {
        self.record(StoreOperation::OpenIndex, index)?;
        let mut stored = self.indexes.get_mut(index).ok_or_else(|| Self::not_found(index))?;
        stored.open = true;
        Ok(())
    }

    async fn put_alias(&self, index: &str, alias: &str, definition: &AliasDefinition) -> Result<(), StoreError> {
        self.record(StoreOperation::PutAlias, index)?;
        let mut stored = self.indexes.get_mut(index).ok_or_else(|| Self::not_found(index))?;
        stored.aliases.insert(alias.to_owned(), definition.clone());
        Ok(())
    }

    async fn remove_alias(&self, index: &str, alias: &str) -> Result<(), StoreError> {
        self.record(StoreOperation::RemoveAlias, index)?;
        let mut stored = self.indexes.get_mut(index).ok_or_else(|| Self::not_found(index))?;
        match stored.aliases.remove(alias) {
            Some(_) => Ok(()),
            None => Err(StoreError::Status {
                status: 404,
                body: format!("aliases [{alias}] missing"),
            }),
        }
    }

    async fn drop_index(&self, index: &str) -> Result<(), StoreError> {
        self.record(StoreOperation::DropIndex, index)?;
        self.indexes
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(index))
    }

    async fn wait_for_status(&self, index: &str, status: IndexStatus, timeout: Duration) -> Result<(), StoreError> {
        self.record(StoreOperation::WaitForStatus, index)?;
        let current = self
            .indexes
            .get(index)
            .map(|stored| stored.status)
            .ok_or_else(|| Self::not_found(index))?;
        if current >= status {
            Ok(())
        } else {
            Err(StoreError::StatusTimeout {
                index: index.to_owned(),
                status,
                timeout,
            })
        }
    }
}

fn check_types(
    current: &IndexMap<String, FieldMapping>,
    incoming: &IndexMap<String, FieldMapping>,
    prefix: &str,
) -> Result<(), StoreError> {
    for (name, field) in incoming {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        let Some(existing) = current.get(name) else {
            continue;
        };
        if existing.effective_type() != field.effective_type() {
            return Err(StoreError::Status {
                status: 400,
                body: format!(
                    "illegal_argument_exception: mapper [{path}] cannot be changed from type [{}] to [{}]",
                    existing.effective_type(),
                    field.effective_type()
                ),
            });
        }
        check_types(&existing.properties, &field.properties, &path)?;
    }
    Ok(())
}

fn merge_properties(current: &mut IndexMap<String, FieldMapping>, incoming: &IndexMap<String, FieldMapping>) {
    for (name, field) in incoming {
        match current.get_mut(name) {
            Some(existing) => {
                let properties = std::mem::take(&mut existing.properties);
                *existing = FieldMapping {
                    properties,
                    ..field.clone()
                };
                merge_properties(&mut existing.properties, &field.properties);
            }
            None => {
                current.insert(name.clone(), field.clone());
            }
        }
    }
}
