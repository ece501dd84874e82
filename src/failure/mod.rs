//! Hierarchical accumulation of schema failures.
//!
//! A [`FailureCollector`] is created for one reconciliation operation. Every
//! comparison step receives a [`ContextualFailureCollector`] positioned at the
//! frame it is working on (index, field, attribute, ...) and records failures
//! there instead of returning early, so a single pass reports every mismatch.

mod context;
mod report;

pub use context::ContextFrame;
pub use report::{Failure, FailureReport};

pub(crate) use report::FailureNode;

/// What kind of difference a failure describes. Used to decide whether a
/// difference can be merged into an existing index or blocks an update.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Dynamicness,
    MissingProperty,
    /// A field attribute differs. Carries the top-level attribute name.
    FieldAttribute(String),
    /// A root mapping attribute such as `_source` differs.
    RootAttribute(String),
    MissingDynamicTemplate,
    DuplicateDynamicTemplate,
    DynamicTemplateOrder,
    DynamicTemplateAttribute,
    MissingAnalysisDefinition,
    AnalysisDefinition,
    /// An analyzer or normalizer references a component the schema on this side lacks.
    MissingComponentDefinition(SchemaSide),
    /// An index setting differs. Carries the key without the `index.` prefix.
    Setting(String),
    MissingAlias,
    AliasAttribute,
    LayoutConflict,
    MissingIndex,
    UpdateBlocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaSide {
    Desired,
    Observed,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedFailure {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct FailureCollector {
    root: FailureNode,
}

impl FailureCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&mut self) -> ContextualFailureCollector<'_> {
        ContextualFailureCollector {
            node: &mut self.root,
        }
    }

    pub fn index(&mut self, name: &str) -> ContextualFailureCollector<'_> {
        ContextualFailureCollector {
            node: self.root.child_mut(ContextFrame::Index(name.to_owned())),
        }
    }

    /// Records a failure under an explicit context, creating frames as needed.
    pub fn add_at(&mut self, context: &[ContextFrame], kind: FailureKind, message: impl Into<String>) {
        let mut node = &mut self.root;
        for frame in context {
            node = node.child_mut(frame.clone());
        }
        node.failures.push(RecordedFailure {
            kind,
            message: message.into(),
        });
    }

    pub fn has_failures(&self) -> bool {
        self.root.has_failures()
    }

    pub fn failures(&self) -> Vec<Failure> {
        self.root.flatten()
    }

    /// Consumes the collector. `None` when nothing was recorded.
    pub fn into_report(self) -> Option<FailureReport> {
        self.root.prune().map(FailureReport::from_root)
    }

    /// Consumes a collector that is known to hold failures.
    ///
    /// Reaching a failed state with nothing recorded is a programming error.
    pub fn into_failed_report(self) -> FailureReport {
        assert!(
            self.has_failures(),
            "a failed schema operation must carry at least one failure"
        );
        FailureReport::from_root(self.root.prune().unwrap_or_default())
    }
}

/// A collector positioned at one frame of the failure tree.
pub struct ContextualFailureCollector<'a> {
    node: &'a mut FailureNode,
}

impl ContextualFailureCollector<'_> {
    pub fn with_context(&mut self, frame: ContextFrame) -> ContextualFailureCollector<'_> {
        ContextualFailureCollector {
            node: self.node.child_mut(frame),
        }
    }

    pub fn add(&mut self, kind: FailureKind, message: impl Into<String>) {
        self.node.failures.push(RecordedFailure {
            kind,
            message: message.into(),
        });
    }

    pub fn has_failures(&self) -> bool {
        self.node.has_failures()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_collector_has_no_report() {
        let mut collector = FailureCollector::new();
        // Opening contexts alone does not create failures.
        collector
            .index("books")
            .with_context(ContextFrame::field("title"));
        assert!(!collector.has_failures());
        assert!(collector.into_report().is_none());
    }

    #[test]
    fn test_failures_keep_their_context_stack() {
        let mut collector = FailureCollector::new();
        {
            let mut index = collector.index("books");
            let mut field = index.with_context(ContextFrame::field("published"));
            field
                .with_context(ContextFrame::attribute("format"))
                .add(FailureKind::FieldAttribute("format".into()), "bad format");
            index.add(FailureKind::LayoutConflict, "bad layout");
        }

        let failures = collector.failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].message, "bad layout");
        assert_eq!(failures[1].path(), "published.format");
        assert_eq!(failures[1].index(), Some("books"));
    }

    #[test]
    fn test_same_frame_is_reused() {
        let mut collector = FailureCollector::new();
        collector
            .index("books")
            .with_context(ContextFrame::field("title"))
            .add(FailureKind::MissingProperty, "first");
        collector
            .index("books")
            .with_context(ContextFrame::field("title"))
            .add(FailureKind::MissingProperty, "second");

        let report = collector.into_report().unwrap();
        let at_title = report.failures_at(&[
            ContextFrame::Index("books".into()),
            ContextFrame::field("title"),
        ]);
        assert_eq!(at_title, vec!["first", "second"]);
    }

    #[test]
    fn test_add_at_builds_missing_frames() {
        let mut collector = FailureCollector::new();
        collector.add_at(
            &[
                ContextFrame::Index("books".into()),
                ContextFrame::setting("number_of_shards"),
            ],
            FailureKind::UpdateBlocked,
            "Unable to update settings: index.number_of_shards",
        );
        let failures = collector.failures();
        assert_eq!(failures[0].path(), "index.number_of_shards");
    }

    #[test]
    #[should_panic(expected = "at least one failure")]
    fn test_failed_report_requires_failures() {
        FailureCollector::new().into_failed_report();
    }
}
