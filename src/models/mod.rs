pub mod alias;
pub mod analysis;
pub mod mapping;
pub mod schema;
pub mod settings;

pub use alias::AliasDefinition;
pub use analysis::{
    AnalysisDefinitions, AnalysisNamespace, AnalyzerDefinition, ComponentDefinition,
    NormalizerDefinition,
};
pub use mapping::{DynamicTemplate, Dynamicness, FieldMapping, NamedDynamicTemplate, RootMapping};
pub use schema::{DesiredIndex, IndexSchema, MetadataView, ObservedIndex};
pub use settings::IndexSettings;

/// Deserialization helpers for the loosely typed values Elasticsearch returns.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Accepts `3`, `"3"` or nothing.
    pub fn number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: std::str::FromStr + TryFrom<u64>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|v| T::try_from(v).ok())
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid number: {n}"))),
            Some(Value::String(s)) => s
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("invalid number: {s}"))),
            Some(other) => Err(serde::de::Error::custom(format!(
                "expected a number, got {other}"
            ))),
        }
    }

    /// Accepts `0.5`, `"0.5"` or nothing.
    pub fn float<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => as_f64(&value)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("expected a float, got {value}"))),
        }
    }

    /// Numeric value of a JSON number or numeric string.
    pub fn as_f64(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Accepts `"a"` or `["a", "b"]`.
    pub fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }
        Ok(match Option::<Raw>::deserialize(deserializer)? {
            None => Vec::new(),
            Some(Raw::One(value)) => vec![value],
            Some(Raw::Many(values)) => values,
        })
    }
}
