use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::models::{AliasDefinition, IndexSchema, IndexSettings, RootMapping};

/// Body of `PUT /<index>`: settings, mappings and aliases in one request.
pub fn create_index_body(
    schema: &IndexSchema,
    aliases: &BTreeMap<String, AliasDefinition>,
) -> Result<Value, StoreError> {
    let mut body = Map::new();
    body.insert("settings".into(), settings_body(&schema.settings)?);
    body.insert("mappings".into(), mapping_body(&schema.mappings)?);
    if !aliases.is_empty() {
        body.insert("aliases".into(), serde_json::to_value(aliases)?);
    }
    Ok(Value::Object(body))
}

/// Body of `PUT /<index>/_settings`, wrapped in `index`.
pub fn settings_body(settings: &IndexSettings) -> Result<Value, StoreError> {
    Ok(json!({ "index": serde_json::to_value(settings)? }))
}

/// Body of `PUT /<index>/_mapping`.
pub fn mapping_body(mapping: &RootMapping) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(mapping)?)
}

/// Body of `PUT /<index>/_alias/<alias>`.
pub fn alias_body(definition: &AliasDefinition) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(definition)?)
}
