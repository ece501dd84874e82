use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// How an object (or the root) treats fields it has no mapping for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dynamicness {
    Strict,
    True,
    False,
}

impl Dynamicness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::True => "true",
            Self::False => "false",
        }
    }
}

impl fmt::Display for Dynamicness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dynamicness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "true" => Ok(Self::True),
            "false" => Ok(Self::False),
            other => Err(format!("unknown dynamic mapping mode '{other}'")),
        }
    }
}

impl Serialize for Dynamicness {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// The store returns either `"strict"`/`"true"`/`"false"` or a JSON boolean.
impl<'de> Deserialize<'de> for Dynamicness {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => Ok(Self::True),
            Raw::Flag(false) => Ok(Self::False),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Mapping of one field.
///
/// `index` and `doc_values` carry the capability the field was derived from:
/// `Some(true)` means the capability is required, `Some(false)` means it is not
/// needed (either value is acceptable in the store), `None` leaves it to the
/// store default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<Dynamicness>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, FieldMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_values: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub norms: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_analyzer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalizer: Option<String>,
    #[serde(default, with = "date_formats", skip_serializing_if = "Vec::is_empty")]
    pub format: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_value: Option<Value>,
    #[serde(
        default,
        deserialize_with = "super::lenient::float",
        skip_serializing_if = "Option::is_none"
    )]
    pub scaling_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_vector: Option<String>,
    #[serde(
        default,
        deserialize_with = "super::lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub dims: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<String>,
    /// Postings options for text, or the HNSW construction parameters for vectors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_options: Option<Value>,
    /// Attributes without a dedicated comparison policy (`fields`, `ignore_above`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldMapping {
    pub fn new(field_type: &str) -> Self {
        Self {
            field_type: Some(field_type.to_owned()),
            ..Default::default()
        }
    }

    /// The declared type, `object` when omitted (the store omits it for objects).
    pub fn effective_type(&self) -> &str {
        self.field_type.as_deref().unwrap_or("object")
    }

    pub fn is_object(&self) -> bool {
        matches!(self.effective_type(), "object" | "nested")
    }

    pub fn is_text(&self) -> bool {
        matches!(self.effective_type(), "text" | "match_only_text" | "annotated_text")
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(
            self.effective_type(),
            "float" | "double" | "half_float" | "scaled_float"
        )
    }

    fn collect_analysis_references(
        &self,
        analyzers: &mut BTreeSet<String>,
        normalizers: &mut BTreeSet<String>,
    ) {
        analyzers.extend(self.analyzer.iter().cloned());
        analyzers.extend(self.search_analyzer.iter().cloned());
        normalizers.extend(self.normalizer.iter().cloned());

        // Multi-fields are kept opaque but may reference analysis components too.
        if let Some(Value::Object(fields)) = self.extra.get("fields") {
            for sub_field in fields.values() {
                for key in ["analyzer", "search_analyzer"] {
                    if let Some(name) = sub_field.get(key).and_then(Value::as_str) {
                        analyzers.insert(name.to_owned());
                    }
                }
                if let Some(name) = sub_field.get("normalizer").and_then(Value::as_str) {
                    normalizers.insert(name.to_owned());
                }
            }
        }

        for child in self.properties.values() {
            child.collect_analysis_references(analyzers, normalizers);
        }
    }
}

mod date_formats {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(formats: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&formats.join("||"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Joined(String),
            List(Vec<String>),
        }
        Ok(match Option::<Raw>::deserialize(deserializer)? {
            None => Vec::new(),
            Some(Raw::Joined(joined)) => joined
                .split("||")
                .map(str::trim)
                .filter(|format| !format.is_empty())
                .map(String::from)
                .collect(),
            Some(Raw::List(list)) => list,
        })
    }
}

/// Body of a dynamic template: what it matches and the mapping it applies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_mapping_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_match: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_unmatch: Option<String>,
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unmatch: Option<String>,
    #[serde(default)]
    pub mapping: FieldMapping,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A dynamic template with its name. On the wire: `{"<name>": {...}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedDynamicTemplate {
    pub name: String,
    pub template: DynamicTemplate,
}

impl NamedDynamicTemplate {
    pub fn new(name: impl Into<String>, template: DynamicTemplate) -> Self {
        Self {
            name: name.into(),
            template,
        }
    }
}

impl Serialize for NamedDynamicTemplate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.name, &self.template)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for NamedDynamicTemplate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = IndexMap::<String, DynamicTemplate>::deserialize(deserializer)?;
        if entries.len() != 1 {
            return Err(serde::de::Error::custom(format!(
                "a dynamic template must have exactly one name, found {}",
                entries.len()
            )));
        }
        entries
            .into_iter()
            .next()
            .map(|(name, template)| Self { name, template })
            .ok_or_else(|| serde::de::Error::custom("empty dynamic template"))
    }
}

/// The root of an index mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<Dynamicness>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dynamic_templates: Vec<NamedDynamicTemplate>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, FieldMapping>,
    /// Root-level attributes such as `_source`, `_routing` or `_meta`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RootMapping {
    /// Looks up a field by dotted path, e.g. `author.name`.
    pub fn field(&self, path: &str) -> Option<&FieldMapping> {
        let mut segments = path.split('.');
        let mut current = self.properties.get(segments.next()?)?;
        for segment in segments {
            current = current.properties.get(segment)?;
        }
        Some(current)
    }

    /// Names of analyzers and normalizers referenced anywhere in this mapping.
    pub fn analysis_references(&self) -> (BTreeSet<String>, BTreeSet<String>) {
        let mut analyzers = BTreeSet::new();
        let mut normalizers = BTreeSet::new();
        for field in self.properties.values() {
            field.collect_analysis_references(&mut analyzers, &mut normalizers);
        }
        for template in &self.dynamic_templates {
            template
                .template
                .mapping
                .collect_analysis_references(&mut analyzers, &mut normalizers);
        }
        (analyzers, normalizers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_store_mapping() {
        let mapping: RootMapping = serde_json::from_value(json!({
            "dynamic": "strict",
            "_source": { "enabled": false },
            "dynamic_templates": [
                { "strings": { "match_mapping_type": "string", "mapping": { "type": "keyword" } } }
            ],
            "properties": {
                "published": { "type": "date", "format": "uuuu-MM-dd||epoch_millis" },
                "author": {
                    "dynamic": false,
                    "properties": { "name": { "type": "text", "analyzer": "english" } }
                },
                "price": { "type": "scaled_float", "scaling_factor": "100" }
            }
        }))
        .unwrap();

        assert_eq!(mapping.dynamic, Some(Dynamicness::Strict));
        assert_eq!(mapping.extra["_source"], json!({ "enabled": false }));
        assert_eq!(mapping.dynamic_templates[0].name, "strings");
        assert_eq!(
            mapping.field("published").unwrap().format,
            vec!["uuuu-MM-dd", "epoch_millis"]
        );
        let author = mapping.field("author").unwrap();
        assert!(author.is_object());
        assert_eq!(author.dynamic, Some(Dynamicness::False));
        assert_eq!(
            mapping.field("author.name").unwrap().analyzer.as_deref(),
            Some("english")
        );
        assert_eq!(mapping.field("price").unwrap().scaling_factor, Some(100.0));
    }

    #[test]
    fn test_serializes_formats_joined() {
        let mut field = FieldMapping::new("date");
        field.format = vec!["uuuu".into(), "epoch_second".into()];
        assert_eq!(
            serde_json::to_value(&field).unwrap(),
            json!({ "type": "date", "format": "uuuu||epoch_second" })
        );
    }

    #[test]
    fn test_dynamic_template_needs_single_name() {
        let result: Result<NamedDynamicTemplate, _> =
            serde_json::from_value(json!({ "a": {}, "b": {} }));
        assert!(result.is_err());
    }

    #[test]
    fn test_analysis_references_include_multi_fields_and_templates() {
        let mapping: RootMapping = serde_json::from_value(json!({
            "dynamic_templates": [
                { "texts": { "mapping": { "type": "text", "analyzer": "folding" } } }
            ],
            "properties": {
                "title": {
                    "type": "text",
                    "analyzer": "english",
                    "search_analyzer": "english_search",
                    "fields": { "sort": { "type": "keyword", "normalizer": "lowercase" } }
                }
            }
        }))
        .unwrap();

        let (analyzers, normalizers) = mapping.analysis_references();
        assert_eq!(
            analyzers.into_iter().collect::<Vec<_>>(),
            vec!["english", "english_search", "folding"]
        );
        assert_eq!(normalizers.into_iter().collect::<Vec<_>>(), vec!["lowercase"]);
    }
}
