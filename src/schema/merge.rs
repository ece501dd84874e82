//! Builds the desired schema of one index from its schema document and the
//! optional custom mapping and settings fragments layered on top of it.

use std::path::Path;

use crate::config::IndexConfig;
use crate::error::SchemaError;
use crate::models::{DesiredIndex, IndexSchema, IndexSettings, RootMapping};

/// Layers a custom mapping fragment under the computed mapping.
///
/// Computed properties win over the fragment; the fragment contributes
/// properties and root attributes (`_source`, `_routing`, ...) the computed
/// mapping does not declare, and dynamic templates under new names.
pub fn merge_custom_mapping(base: &mut RootMapping, custom: RootMapping) {
    if base.dynamic.is_none() {
        base.dynamic = custom.dynamic;
    }
    for (name, field) in custom.properties {
        base.properties.entry(name).or_insert(field);
    }
    for (key, value) in custom.extra {
        base.extra.entry(key).or_insert(value);
    }
    for template in custom.dynamic_templates {
        if !base.dynamic_templates.iter().any(|existing| existing.name == template.name) {
            base.dynamic_templates.push(template);
        }
    }
}

/// Overlays a custom settings fragment on the computed settings. The fragment
/// wins key by key; analysis definitions are merged by name.
pub fn merge_custom_settings(base: &mut IndexSettings, custom: IndexSettings) {
    if custom.number_of_shards.is_some() {
        base.number_of_shards = custom.number_of_shards;
    }
    if custom.number_of_replicas.is_some() {
        base.number_of_replicas = custom.number_of_replicas;
    }
    if custom.max_result_window.is_some() {
        base.max_result_window = custom.max_result_window;
    }
    let flat = custom.custom_flat();
    base.analysis.merge_from(custom.analysis);
    for (key, value) in flat {
        base.set_custom(&key, value);
    }
}

/// Reads the schema document of `config` and merges its override files into it.
pub fn load_desired_index(config: &IndexConfig) -> Result<DesiredIndex, SchemaError> {
    let mut schema: IndexSchema = read_json(&config.schema_file)?;

    if let Some(path) = &config.mapping_file {
        let custom: RootMapping = read_json(path)?;
        merge_custom_mapping(&mut schema.mappings, custom);
        tracing::debug!("Merged custom mapping {} into '{}'", path.display(), config.name);
    }
    if let Some(path) = &config.settings_file {
        let value: serde_json::Value = read_json(path)?;
        let custom = IndexSettings::from_value(value)?;
        merge_custom_settings(&mut schema.settings, custom);
        tracing::debug!("Merged custom settings {} into '{}'", path.display(), config.name);
    }

    Ok(DesiredIndex::new(config.name.clone(), schema))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, SchemaError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| SchemaError::Config(format!("Cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| SchemaError::Config(format!("Invalid JSON in {}: {e}", path.display())))
}
