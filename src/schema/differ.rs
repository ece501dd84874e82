use super::{analysis, mapping, settings};
use crate::failure::{ContextualFailureCollector, FailureCollector, FailureReport};
use crate::models::IndexSchema;

/// Walks the desired and observed schema of one index in lock-step and
/// records every difference. Mismatches are reported, never raised.
pub fn compare_schema(
    desired: &IndexSchema,
    observed: &IndexSchema,
    collector: &mut ContextualFailureCollector<'_>,
) {
    mapping::compare_root(&desired.mappings, &observed.mappings, collector);
    analysis::compare_analysis(
        &desired.mappings,
        &desired.settings.analysis,
        &observed.settings.analysis,
        collector,
    );
    settings::compare_settings(&desired.settings, &observed.settings, collector);
}

/// Compares two schemas of the index `name`. `None` when they agree.
pub fn diff(name: &str, desired: &IndexSchema, observed: &IndexSchema) -> Option<FailureReport> {
    let mut collector = FailureCollector::new();
    compare_schema(desired, observed, &mut collector.index(name));
    collector.into_report()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(value: serde_json::Value) -> IndexSchema {
        serde_json::from_value(value).unwrap()
    }

    fn desired() -> IndexSchema {
        schema(json!({
            "mappings": {
                "dynamic": "strict",
                "properties": {
                    "title": { "type": "text", "analyzer": "folding" },
                    "published": { "type": "date", "format": "uuuu-MM-dd" }
                }
            },
            "settings": {
                "number_of_shards": 1,
                "analysis": {
                    "analyzer": { "folding": { "type": "custom", "tokenizer": "standard", "filter": ["asciifolding"] } }
                }
            }
        }))
    }

    #[test]
    fn test_same_schema_has_no_report() {
        assert!(diff("books", &desired(), &desired()).is_none());
    }

    #[test]
    fn test_superset_observed_schema_validates() {
        let observed = schema(json!({
            "mappings": {
                "dynamic": "strict",
                "properties": {
                    "title": { "type": "text", "analyzer": "folding" },
                    "published": { "type": "date", "format": "uuuu-MM-dd" },
                    "extra": { "type": "keyword" }
                }
            },
            "settings": {
                "index": {
                    "number_of_shards": "1",
                    "number_of_replicas": "2",
                    "refresh_interval": "30s",
                    "analysis": {
                        "analyzer": {
                            "folding": { "type": "custom", "tokenizer": "standard", "filter": ["asciifolding"] },
                            "other": { "type": "custom", "tokenizer": "keyword" }
                        }
                    }
                }
            }
        }));
        assert!(diff("books", &desired(), &observed).is_none());
    }

    #[test]
    fn test_report_collects_every_section() {
        let observed = schema(json!({
            "mappings": {
                "dynamic": "strict",
                "properties": { "title": { "type": "text", "analyzer": "folding" } }
            },
            "settings": { "index": { "number_of_shards": "2" } }
        }));

        let report = diff("books", &desired(), &observed).unwrap();
        let paths: Vec<String> = report.failures().iter().map(|f| f.path()).collect();
        assert_eq!(paths, vec!["published", "folding", "index.number_of_shards"]);
        assert_eq!(report.indexes(), vec!["books"]);
    }
}
