use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::failure::ContextFrame;

/// Namespaces analysis definitions live in. Token filters are
/// `filter` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnalysisNamespace {
    Analyzer,
    Normalizer,
    Tokenizer,
    CharFilter,
    TokenFilter,
}

impl AnalysisNamespace {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Analyzer => "analyzer",
            Self::Normalizer => "normalizer",
            Self::Tokenizer => "tokenizer",
            Self::CharFilter => "char filter",
            Self::TokenFilter => "token filter",
        }
    }

    pub fn frame(&self, name: &str) -> ContextFrame {
        let name = name.to_owned();
        match self {
            Self::Analyzer => ContextFrame::Analyzer(name),
            Self::Normalizer => ContextFrame::Normalizer(name),
            Self::Tokenizer => ContextFrame::Tokenizer(name),
            Self::CharFilter => ContextFrame::CharFilter(name),
            Self::TokenFilter => ContextFrame::TokenFilter(name),
        }
    }

    pub fn missing_message(&self) -> String {
        format!("Missing {}", self.label())
    }
}

impl fmt::Display for AnalysisNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerDefinition {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub analyzer_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer: Option<String>,
    #[serde(
        default,
        deserialize_with = "super::lenient::string_or_seq",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub char_filter: Vec<String>,
    #[serde(
        default,
        deserialize_with = "super::lenient::string_or_seq",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub filter: Vec<String>,
    #[serde(flatten)]
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizerDefinition {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub normalizer_type: Option<String>,
    #[serde(
        default,
        deserialize_with = "super::lenient::string_or_seq",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub char_filter: Vec<String>,
    #[serde(
        default,
        deserialize_with = "super::lenient::string_or_seq",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub filter: Vec<String>,
    #[serde(flatten)]
    pub parameters: Map<String, Value>,
}

/// Tokenizer, char filter or token filter definition: a type plus parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    #[serde(flatten)]
    pub parameters: Map<String, Value>,
}

impl ComponentDefinition {
    pub fn new(component_type: &str) -> Self {
        Self {
            component_type: Some(component_type.to_owned()),
            parameters: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDefinitions {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub analyzer: BTreeMap<String, AnalyzerDefinition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub normalizer: BTreeMap<String, NormalizerDefinition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tokenizer: BTreeMap<String, ComponentDefinition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub char_filter: BTreeMap<String, ComponentDefinition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filter: BTreeMap<String, ComponentDefinition>,
}

impl AnalysisDefinitions {
    pub fn is_empty(&self) -> bool {
        self.analyzer.is_empty()
            && self.normalizer.is_empty()
            && self.tokenizer.is_empty()
            && self.char_filter.is_empty()
            && self.filter.is_empty()
    }

    /// Tokenizer, char filter and token filter namespaces.
    pub fn components(&self, namespace: AnalysisNamespace) -> Option<&BTreeMap<String, ComponentDefinition>> {
        match namespace {
            AnalysisNamespace::Tokenizer => Some(&self.tokenizer),
            AnalysisNamespace::CharFilter => Some(&self.char_filter),
            AnalysisNamespace::TokenFilter => Some(&self.filter),
            AnalysisNamespace::Analyzer | AnalysisNamespace::Normalizer => None,
        }
    }

    pub fn defines(&self, namespace: AnalysisNamespace, name: &str) -> bool {
        match namespace {
            AnalysisNamespace::Analyzer => self.analyzer.contains_key(name),
            AnalysisNamespace::Normalizer => self.normalizer.contains_key(name),
            _ => self
                .components(namespace)
                .is_some_and(|definitions| definitions.contains_key(name)),
        }
    }

    /// Overlays `other` on top of `self`, definition by definition.
    pub fn merge_from(&mut self, other: AnalysisDefinitions) {
        self.analyzer.extend(other.analyzer);
        self.normalizer.extend(other.normalizer);
        self.tokenizer.extend(other.tokenizer);
        self.char_filter.extend(other.char_filter);
        self.filter.extend(other.filter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_analysis_block() {
        let analysis: AnalysisDefinitions = serde_json::from_value(json!({
            "analyzer": {
                "english": {
                    "type": "custom",
                    "tokenizer": "standard",
                    "filter": ["lowercase", "english_stemmer"],
                    "char_filter": "html_strip"
                }
            },
            "filter": {
                "english_stemmer": { "type": "stemmer", "language": "english" }
            }
        }))
        .unwrap();

        let english = &analysis.analyzer["english"];
        assert_eq!(english.filter, vec!["lowercase", "english_stemmer"]);
        assert_eq!(english.char_filter, vec!["html_strip"]);
        assert!(analysis.defines(AnalysisNamespace::TokenFilter, "english_stemmer"));
        assert!(!analysis.defines(AnalysisNamespace::TokenFilter, "lowercase"));
        assert_eq!(
            analysis.filter["english_stemmer"].parameters["language"],
            json!("english")
        );
    }

    #[test]
    fn test_missing_message_names_namespace() {
        assert_eq!(
            AnalysisNamespace::TokenFilter.missing_message(),
            "Missing token filter"
        );
        assert_eq!(AnalysisNamespace::Analyzer.missing_message(), "Missing analyzer");
    }
}
