use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::analysis::AnalysisDefinitions;

/// Index-level settings.
///
/// Keys are held without the `index.` prefix. Anything that is not shard
/// count, replica count, result window or analysis is kept in `custom`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSettings {
    #[serde(
        default,
        deserialize_with = "super::lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub number_of_shards: Option<u32>,
    #[serde(
        default,
        deserialize_with = "super::lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub number_of_replicas: Option<u32>,
    #[serde(
        default,
        deserialize_with = "super::lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_result_window: Option<u64>,
    #[serde(default, skip_serializing_if = "AnalysisDefinitions::is_empty")]
    pub analysis: AnalysisDefinitions,
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

impl IndexSettings {
    /// Parses settings in any of the shapes the store accepts: wrapped in
    /// `{"index": {...}}`, nested, or with flat `index.`-prefixed keys.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(normalize(value))
    }

    /// Sets a custom setting by dotted key, e.g. `sort.field`.
    pub fn set_custom(&mut self, key: &str, value: Value) {
        insert_path(&mut self.custom, key.strip_prefix("index.").unwrap_or(key), value);
    }

    /// Custom settings flattened to dotted keys, e.g. `sort.field`.
    pub fn custom_flat(&self) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        flatten_into(&self.custom, "", &mut out);
        out
    }
}

/// Accepts every shape [`IndexSettings::from_value`] does.
pub(crate) fn deserialize_settings<'de, D>(deserializer: D) -> Result<IndexSettings, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?.unwrap_or(Value::Null);
    if value.is_null() {
        return Ok(IndexSettings::default());
    }
    IndexSettings::from_value(value).map_err(serde::de::Error::custom)
}

fn normalize(value: Value) -> Value {
    let Value::Object(map) = value else {
        return value;
    };
    let mut out = Map::new();
    for (key, value) in map {
        if key == "index" {
            if let Value::Object(_) = value {
                if let Value::Object(inner) = normalize(value) {
                    for (inner_key, inner_value) in inner {
                        insert_path(&mut out, &inner_key, inner_value);
                    }
                }
                continue;
            }
        }
        let key = key.strip_prefix("index.").unwrap_or(&key).to_owned();
        insert_path(&mut out, &key, value);
    }
    Value::Object(out)
}

fn insert_path(target: &mut Map<String, Value>, dotted: &str, value: Value) {
    match dotted.split_once('.') {
        None => match (target.get_mut(dotted), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                for (key, value) in incoming {
                    insert_path(existing, &key, value);
                }
            }
            (_, value) => {
                target.insert(dotted.to_owned(), value);
            }
        },
        Some((head, rest)) => {
            let entry = target
                .entry(head.to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                insert_path(child, rest, value);
            }
        }
    }
}

fn flatten_into(map: &Map<String, Value>, prefix: &str, out: &mut BTreeMap<String, Value>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(child) if !child.is_empty() => flatten_into(child, &path, out),
            other => {
                out.insert(path, other.clone());
            }
        }
    }
}
