use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Definition of an alias on one concrete index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AliasDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_write_index: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_routing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_routing: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AliasDefinition {
    pub fn write() -> Self {
        Self {
            is_write_index: Some(true),
            ..Default::default()
        }
    }

    pub fn read() -> Self {
        Self {
            is_write_index: Some(false),
            ..Default::default()
        }
    }
}
