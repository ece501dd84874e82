//! Comparison of analysis definitions.
//!
//! Only definitions reachable from the desired mapping are validated: an
//! analyzer that no field references is never looked at, and neither are the
//! tokenizers and filters of such an analyzer. Analyzers the desired schema
//! does not define are assumed to be built into the store; components it does
//! not define must be built-in (see [`is_builtin`]).

use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::compare;
use super::mapping::UNORDERED_PARAMETERS;
use crate::failure::{ContextFrame, ContextualFailureCollector, FailureKind, SchemaSide};
use crate::models::{AnalysisDefinitions, AnalysisNamespace, ComponentDefinition, RootMapping};

const BUILTIN_TOKENIZERS: &[&str] = &[
    "char_group",
    "classic",
    "edge_ngram",
    "keyword",
    "letter",
    "lowercase",
    "ngram",
    "path_hierarchy",
    "pattern",
    "simple_pattern",
    "simple_pattern_split",
    "standard",
    "thai",
    "uax_url_email",
    "whitespace",
];

const BUILTIN_CHAR_FILTERS: &[&str] = &["html_strip", "mapping", "pattern_replace"];

const BUILTIN_TOKEN_FILTERS: &[&str] = &[
    "apostrophe",
    "arabic_normalization",
    "arabic_stem",
    "asciifolding",
    "bengali_normalization",
    "brazilian_stem",
    "cjk_bigram",
    "cjk_width",
    "classic",
    "common_grams",
    "czech_stem",
    "decimal_digit",
    "delimited_payload",
    "dutch_stem",
    "edge_ngram",
    "elision",
    "fingerprint",
    "flatten_graph",
    "french_stem",
    "german_normalization",
    "german_stem",
    "hindi_normalization",
    "indic_normalization",
    "keyword_repeat",
    "kstem",
    "length",
    "limit",
    "lowercase",
    "min_hash",
    "ngram",
    "persian_normalization",
    "porter_stem",
    "remove_duplicates",
    "reverse",
    "russian_stem",
    "scandinavian_folding",
    "scandinavian_normalization",
    "serbian_normalization",
    "shingle",
    "snowball",
    "sorani_normalization",
    "stemmer",
    "stop",
    "trim",
    "truncate",
    "unique",
    "uppercase",
    "word_delimiter",
    "word_delimiter_graph",
];

/// Analysis plugins register their components under these prefixes.
const PLUGIN_PREFIXES: &[&str] = &["icu_", "ik_", "kuromoji_", "nori_", "phonetic", "smartcn_", "stempel_"];

/// Whether the store provides `name` in `namespace` without a definition.
pub fn is_builtin(namespace: AnalysisNamespace, name: &str) -> bool {
    let builtin = match namespace {
        AnalysisNamespace::Tokenizer => BUILTIN_TOKENIZERS,
        AnalysisNamespace::CharFilter => BUILTIN_CHAR_FILTERS,
        AnalysisNamespace::TokenFilter => BUILTIN_TOKEN_FILTERS,
        AnalysisNamespace::Analyzer | AnalysisNamespace::Normalizer => return false,
    };
    builtin.contains(&name) || PLUGIN_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

pub fn compare_analysis(
    mapping: &RootMapping,
    desired: &AnalysisDefinitions,
    observed: &AnalysisDefinitions,
    collector: &mut ContextualFailureCollector<'_>,
) {
    let (analyzers, normalizers) = mapping.analysis_references();
    let mut differ = AnalysisDiffer {
        desired,
        observed,
        visited: BTreeSet::new(),
    };

    for name in analyzers.iter().filter(|name| desired.analyzer.contains_key(*name)) {
        differ.compare_analyzer(name, collector);
    }
    for name in normalizers.iter().filter(|name| desired.normalizer.contains_key(*name)) {
        differ.compare_normalizer(name, collector);
    }
}

struct AnalysisDiffer<'a> {
    desired: &'a AnalysisDefinitions,
    observed: &'a AnalysisDefinitions,
    visited: BTreeSet<(AnalysisNamespace, String)>,
}

impl AnalysisDiffer<'_> {
    fn compare_analyzer(&mut self, name: &str, collector: &mut ContextualFailureCollector<'_>) {
        let Some(expected) = self.desired.analyzer.get(name) else {
            return;
        };
        let mut context = collector.with_context(AnalysisNamespace::Analyzer.frame(name));
        let references = component_references(
            expected.tokenizer.as_deref(),
            &expected.char_filter,
            &expected.filter,
        );
        self.report_undefined(&references, &mut context);

        match self.observed.analyzer.get(name) {
            None => context.add(
                FailureKind::MissingAnalysisDefinition,
                AnalysisNamespace::Analyzer.missing_message(),
            ),
            Some(actual) => {
                compare::validate_exact(
                    &mut context,
                    "type",
                    FailureKind::AnalysisDefinition,
                    expected.analyzer_type.as_deref(),
                    actual.analyzer_type.as_deref(),
                    Some("custom"),
                );
                compare::validate_exact(
                    &mut context,
                    "tokenizer",
                    FailureKind::AnalysisDefinition,
                    expected.tokenizer.as_deref(),
                    actual.tokenizer.as_deref(),
                    None,
                );
                // Filter chains are applied in order.
                compare_chain(&mut context, "char_filter", &expected.char_filter, &actual.char_filter);
                compare_chain(&mut context, "filter", &expected.filter, &actual.filter);
                compare_parameters(&mut context, &expected.parameters, &actual.parameters);
                self.report_dangling(&references, &mut context);
            }
        }

        for (namespace, component) in references {
            self.compare_component(namespace, component, collector);
        }
    }

    fn compare_normalizer(&mut self, name: &str, collector: &mut ContextualFailureCollector<'_>) {
        let Some(expected) = self.desired.normalizer.get(name) else {
            return;
        };
        let mut context = collector.with_context(AnalysisNamespace::Normalizer.frame(name));
        let references = component_references(None, &expected.char_filter, &expected.filter);
        self.report_undefined(&references, &mut context);

        match self.observed.normalizer.get(name) {
            None => context.add(
                FailureKind::MissingAnalysisDefinition,
                AnalysisNamespace::Normalizer.missing_message(),
            ),
            Some(actual) => {
                compare::validate_exact(
                    &mut context,
                    "type",
                    FailureKind::AnalysisDefinition,
                    expected.normalizer_type.as_deref(),
                    actual.normalizer_type.as_deref(),
                    Some("custom"),
                );
                compare_chain(&mut context, "char_filter", &expected.char_filter, &actual.char_filter);
                compare_chain(&mut context, "filter", &expected.filter, &actual.filter);
                compare_parameters(&mut context, &expected.parameters, &actual.parameters);
                self.report_dangling(&references, &mut context);
            }
        }

        for (namespace, component) in references {
            self.compare_component(namespace, component, collector);
        }
    }

    /// A component the desired schema neither defines nor gets from the store
    /// cannot be installed by any update.
    fn report_undefined(
        &self,
        references: &[(AnalysisNamespace, &str)],
        context: &mut ContextualFailureCollector<'_>,
    ) {
        for (namespace, component) in references {
            if !self.desired.defines(*namespace, component) && !is_builtin(*namespace, component) {
                context.add(
                    FailureKind::MissingComponentDefinition(SchemaSide::Desired),
                    format!(
                        "Missing component definition: {namespace} '{component}' is referenced but neither defined nor built in."
                    ),
                );
            }
        }
    }

    /// A component the desired schema defines but the store does not is a
    /// dangling reference on the observed side, reported where it is used.
    fn report_dangling(
        &self,
        references: &[(AnalysisNamespace, &str)],
        context: &mut ContextualFailureCollector<'_>,
    ) {
        for (namespace, component) in references {
            if self.desired.defines(*namespace, component) && !self.observed.defines(*namespace, component) {
                context.add(
                    FailureKind::MissingComponentDefinition(SchemaSide::Observed),
                    format!(
                        "Missing component definition: {namespace} '{component}' is referenced but not defined."
                    ),
                );
            }
        }
    }

    fn compare_component(
        &mut self,
        namespace: AnalysisNamespace,
        name: &str,
        collector: &mut ContextualFailureCollector<'_>,
    ) {
        let Some(expected) = self
            .desired
            .components(namespace)
            .and_then(|definitions| definitions.get(name))
        else {
            return;
        };
        if !self.visited.insert((namespace, name.to_owned())) {
            return;
        }

        let mut context = collector.with_context(namespace.frame(name));
        let actual = self
            .observed
            .components(namespace)
            .and_then(|definitions| definitions.get(name));
        match actual {
            None => context.add(FailureKind::MissingAnalysisDefinition, namespace.missing_message()),
            Some(actual) => compare_definition(expected, actual, &mut context),
        }
    }
}

fn component_references<'a>(
    tokenizer: Option<&'a str>,
    char_filters: &'a [String],
    filters: &'a [String],
) -> Vec<(AnalysisNamespace, &'a str)> {
    tokenizer
        .map(|name| (AnalysisNamespace::Tokenizer, name))
        .into_iter()
        .chain(
            char_filters
                .iter()
                .map(|name| (AnalysisNamespace::CharFilter, name.as_str())),
        )
        .chain(
            filters
                .iter()
                .map(|name| (AnalysisNamespace::TokenFilter, name.as_str())),
        )
        .collect()
}

fn compare_definition(
    expected: &ComponentDefinition,
    actual: &ComponentDefinition,
    context: &mut ContextualFailureCollector<'_>,
) {
    compare::validate_exact(
        context,
        "type",
        FailureKind::AnalysisDefinition,
        expected.component_type.as_deref(),
        actual.component_type.as_deref(),
        None,
    );
    compare_parameters(context, &expected.parameters, &actual.parameters);
}

fn compare_chain(
    context: &mut ContextualFailureCollector<'_>,
    attribute: &str,
    expected: &[String],
    actual: &[String],
) {
    if expected != actual {
        compare::record(
            context,
            attribute,
            FailureKind::AnalysisDefinition,
            compare::AttributeMatch::Mismatch,
            format!("[{}]", expected.join(", ")),
            format!("[{}]", actual.join(", ")),
        );
    }
}

fn compare_parameters(
    context: &mut ContextualFailureCollector<'_>,
    expected: &Map<String, Value>,
    actual: &Map<String, Value>,
) {
    for (parameter, value) in expected {
        compare::compare_values(
            value,
            actual.get(parameter),
            UNORDERED_PARAMETERS,
            Some(parameter),
            &FailureKind::AnalysisDefinition,
            &mut context.with_context(ContextFrame::attribute(parameter.as_str())),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::FailureCollector;
    use serde_json::json;

    fn analysis(value: Value) -> AnalysisDefinitions {
        serde_json::from_value(value).unwrap()
    }

    fn title_with(analyzer: &str) -> RootMapping {
        serde_json::from_value(json!({
            "properties": { "title": { "type": "text", "analyzer": analyzer } }
        }))
        .unwrap()
    }

    fn english() -> AnalysisDefinitions {
        analysis(json!({
            "analyzer": {
                "english": { "type": "custom", "tokenizer": "standard", "filter": ["lowercase", "english_stemmer"] },
                "unused": { "type": "custom", "tokenizer": "whitespace" }
            },
            "filter": {
                "english_stemmer": { "type": "stemmer", "language": "english" }
            }
        }))
    }

    fn run(mapping: &RootMapping, desired: &AnalysisDefinitions, observed: &AnalysisDefinitions) -> FailureCollector {
        let mut collector = FailureCollector::new();
        compare_analysis(mapping, desired, observed, &mut collector.index("books"));
        collector
    }

    #[test]
    fn test_identical_analysis_matches() {
        let collector = run(&title_with("english"), &english(), &english());
        assert!(!collector.has_failures());
    }

    #[test]
    fn test_unreferenced_definitions_are_not_validated() {
        let mut observed = english();
        observed.analyzer.remove("unused");
        let collector = run(&title_with("english"), &english(), &observed);
        assert!(!collector.has_failures());
    }

    #[test]
    fn test_missing_analyzer() {
        let collector = run(&title_with("english"), &english(), &AnalysisDefinitions::default());
        let report = collector.into_report().unwrap();
        assert_eq!(
            report.failures_at(&[
                ContextFrame::Index("books".into()),
                ContextFrame::Analyzer("english".into()),
            ]),
            vec!["Missing analyzer"]
        );
        assert_eq!(
            report.failures_at(&[
                ContextFrame::Index("books".into()),
                ContextFrame::TokenFilter("english_stemmer".into()),
            ]),
            vec!["Missing token filter"]
        );
    }

    #[test]
    fn test_dangling_reference_is_reported_at_both_sites() {
        let mut observed = english();
        observed.filter.clear();
        let report = run(&title_with("english"), &english(), &observed)
            .into_report()
            .unwrap();

        assert_eq!(
            report.failures_at(&[
                ContextFrame::Index("books".into()),
                ContextFrame::Analyzer("english".into()),
            ]),
            vec!["Missing component definition: token filter 'english_stemmer' is referenced but not defined."]
        );
        assert_eq!(
            report.failures_at(&[
                ContextFrame::Index("books".into()),
                ContextFrame::TokenFilter("english_stemmer".into()),
            ]),
            vec!["Missing token filter"]
        );
    }

    #[test]
    fn test_undefined_desired_component_is_reported() {
        let mut desired = english();
        if let Some(analyzer) = desired.analyzer.get_mut("english") {
            analyzer.filter = vec!["lowercase".into(), "english_stemer".into()];
        }
        let observed = desired.clone();
        let failures = run(&title_with("english"), &desired, &observed).failures();

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::MissingComponentDefinition(SchemaSide::Desired));
        assert_eq!(
            failures[0].context,
            vec![
                ContextFrame::Index("books".into()),
                ContextFrame::Analyzer("english".into()),
            ]
        );
        assert_eq!(
            failures[0].message,
            "Missing component definition: token filter 'english_stemer' is referenced but neither defined nor built in."
        );
    }

    #[test]
    fn test_builtin_components() {
        assert!(is_builtin(AnalysisNamespace::Tokenizer, "standard"));
        assert!(is_builtin(AnalysisNamespace::CharFilter, "html_strip"));
        assert!(is_builtin(AnalysisNamespace::TokenFilter, "asciifolding"));
        assert!(is_builtin(AnalysisNamespace::Tokenizer, "ik_max_word"));
        assert!(!is_builtin(AnalysisNamespace::TokenFilter, "english_stemmer"));
        assert!(!is_builtin(AnalysisNamespace::Analyzer, "standard"));
    }

    #[test]
    fn test_filter_chain_order_matters() {
        let mut observed = english();
        if let Some(analyzer) = observed.analyzer.get_mut("english") {
            analyzer.filter.reverse();
        }
        let failures = run(&title_with("english"), &english(), &observed).failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path(), "english.filter");
        assert_eq!(
            failures[0].message,
            "Invalid value. Expected '[lowercase, english_stemmer]', actual is '[english_stemmer, lowercase]'."
        );
    }

    #[test]
    fn test_token_chars_are_unordered() {
        let desired = analysis(json!({
            "analyzer": { "grams": { "type": "custom", "tokenizer": "grams" } },
            "tokenizer": { "grams": { "type": "ngram", "min_gram": 2, "token_chars": ["letter", "digit"] } }
        }));
        let observed = analysis(json!({
            "analyzer": { "grams": { "type": "custom", "tokenizer": "grams" } },
            "tokenizer": { "grams": { "type": "ngram", "min_gram": "2", "token_chars": ["digit", "letter"] } }
        }));
        assert!(!run(&title_with("grams"), &desired, &observed).has_failures());
    }

    #[test]
    fn test_component_parameter_mismatch() {
        let mut observed = english();
        if let Some(stemmer) = observed.filter.get_mut("english_stemmer") {
            stemmer.parameters.insert("language".into(), json!("light_english"));
        }
        let failures = run(&title_with("english"), &english(), &observed).failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path(), "english_stemmer.language");
    }

    #[test]
    fn test_normalizer_references() {
        let mapping: RootMapping = serde_json::from_value(json!({
            "properties": { "tag": { "type": "keyword", "normalizer": "folded" } }
        }))
        .unwrap();
        let desired = analysis(json!({
            "normalizer": { "folded": { "type": "custom", "filter": ["lowercase", "asciifolding"] } }
        }));
        let collector = run(&mapping, &desired, &AnalysisDefinitions::default());
        assert_eq!(collector.failures()[0].message, "Missing normalizer");
    }
}
