use std::collections::BTreeSet;
use std::fmt;

use crate::config::DialectConfig;
use crate::failure::{ContextFrame, Failure, FailureKind, SchemaSide};

/// How an update can deal with one recorded difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mergeability {
    /// Can be applied to the existing index. Some settings can only be
    /// changed while the index is closed.
    Mergeable { requires_close: bool },
    Fatal,
}

impl Mergeability {
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Fatal)
    }
}

/// Store-specific knowledge of which differences an update can apply.
pub trait UpdateDialect: fmt::Debug + Send + Sync {
    fn classify(&self, failure: &Failure) -> Mergeability;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElasticsearchDialect {
    immutable_settings: BTreeSet<String>,
    dynamic_settings: BTreeSet<String>,
    mergeable_attributes: BTreeSet<String>,
}

impl ElasticsearchDialect {
    pub fn from_config(config: &DialectConfig) -> Self {
        Self {
            immutable_settings: config.immutable_settings.iter().map(|key| normalize_key(key)).collect(),
            dynamic_settings: config.dynamic_settings.iter().map(|key| normalize_key(key)).collect(),
            mergeable_attributes: config.mergeable_attributes.iter().cloned().collect(),
        }
    }

    fn classify_setting(&self, key: &str) -> Mergeability {
        if self.immutable_settings.contains(key) {
            Mergeability::Fatal
        } else if self.dynamic_settings.contains(key) {
            Mergeability::Mergeable {
                requires_close: false,
            }
        } else {
            Mergeability::Mergeable {
                requires_close: true,
            }
        }
    }
}

impl Default for ElasticsearchDialect {
    fn default() -> Self {
        Self::from_config(&DialectConfig::default())
    }
}

fn normalize_key(key: &str) -> String {
    key.strip_prefix("index.").unwrap_or(key).to_owned()
}

impl UpdateDialect for ElasticsearchDialect {
    fn classify(&self, failure: &Failure) -> Mergeability {
        const MERGE: Mergeability = Mergeability::Mergeable {
            requires_close: false,
        };
        match &failure.kind {
            FailureKind::Setting(key) => self.classify_setting(key),
            FailureKind::MissingAnalysisDefinition
            | FailureKind::AnalysisDefinition
            | FailureKind::MissingComponentDefinition(SchemaSide::Observed) => Mergeability::Mergeable {
                requires_close: true,
            },
            FailureKind::MissingProperty
            | FailureKind::Dynamicness
            | FailureKind::MissingDynamicTemplate
            | FailureKind::DuplicateDynamicTemplate
            | FailureKind::DynamicTemplateOrder
            | FailureKind::DynamicTemplateAttribute => MERGE,
            // Templates are replaced as a whole, so their mapping can always change.
            FailureKind::FieldAttribute(_)
                if failure
                    .context
                    .iter()
                    .any(|frame| matches!(frame, ContextFrame::DynamicTemplate(_))) =>
            {
                MERGE
            }
            FailureKind::FieldAttribute(attribute) if self.mergeable_attributes.contains(attribute) => MERGE,
            FailureKind::MissingAlias | FailureKind::AliasAttribute => MERGE,
            FailureKind::FieldAttribute(_)
            | FailureKind::RootAttribute(_)
            | FailureKind::MissingComponentDefinition(SchemaSide::Desired)
            | FailureKind::LayoutConflict
            | FailureKind::MissingIndex
            | FailureKind::UpdateBlocked => Mergeability::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(context: Vec<ContextFrame>, kind: FailureKind) -> Failure {
        Failure {
            context,
            kind,
            message: String::new(),
        }
    }

    fn at_index(kind: FailureKind) -> Failure {
        failure(vec![ContextFrame::Index("books".into())], kind)
    }

    #[test]
    fn test_settings_classification() {
        let dialect = ElasticsearchDialect::default();
        assert_eq!(
            dialect.classify(&at_index(FailureKind::Setting("number_of_shards".into()))),
            Mergeability::Fatal
        );
        assert_eq!(
            dialect.classify(&at_index(FailureKind::Setting("number_of_replicas".into()))),
            Mergeability::Mergeable {
                requires_close: false
            }
        );
        assert_eq!(
            dialect.classify(&at_index(FailureKind::Setting("codec".into()))),
            Mergeability::Mergeable {
                requires_close: true
            }
        );
    }

    #[test]
    fn test_field_attributes() {
        let dialect = ElasticsearchDialect::default();
        assert!(
            dialect
                .classify(&at_index(FailureKind::FieldAttribute("type".into())))
                .is_fatal()
        );
        assert!(
            !dialect
                .classify(&at_index(FailureKind::FieldAttribute("ignore_above".into())))
                .is_fatal()
        );

        let in_template = failure(
            vec![
                ContextFrame::Index("books".into()),
                ContextFrame::DynamicTemplate("strings".into()),
                ContextFrame::attribute("mapping"),
            ],
            FailureKind::FieldAttribute("type".into()),
        );
        assert!(!dialect.classify(&in_template).is_fatal());
    }

    #[test]
    fn test_analysis_needs_close() {
        let dialect = ElasticsearchDialect::default();
        assert_eq!(
            dialect.classify(&at_index(FailureKind::MissingAnalysisDefinition)),
            Mergeability::Mergeable {
                requires_close: true
            }
        );
    }

    #[test]
    fn test_dangling_component_by_side() {
        let dialect = ElasticsearchDialect::default();
        assert_eq!(
            dialect.classify(&at_index(FailureKind::MissingComponentDefinition(SchemaSide::Observed))),
            Mergeability::Mergeable {
                requires_close: true
            }
        );
        assert!(
            dialect
                .classify(&at_index(FailureKind::MissingComponentDefinition(SchemaSide::Desired)))
                .is_fatal()
        );
    }

    #[test]
    fn test_lists_come_from_configuration() {
        let config = DialectConfig {
            immutable_settings: vec!["index.codec".into()],
            dynamic_settings: Vec::new(),
            mergeable_attributes: vec!["norms".into()],
        };
        let dialect = ElasticsearchDialect::from_config(&config);
        assert!(
            dialect
                .classify(&at_index(FailureKind::Setting("codec".into())))
                .is_fatal()
        );
        assert!(
            !dialect
                .classify(&at_index(FailureKind::Setting("number_of_shards".into())))
                .is_fatal()
        );
        assert!(
            !dialect
                .classify(&at_index(FailureKind::FieldAttribute("norms".into())))
                .is_fatal()
        );
    }
}
