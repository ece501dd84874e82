//! Decides what an operation has to do to one index.
//!
//! Planning is pure: it takes the desired schema and the metadata view the
//! store returned, and yields the ordered actions to execute together with the
//! failures the operation ends with.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::alias::{self, AliasAction, AliasPlan, IndexLayoutStrategy, IndexNames};
use super::dialect::{Mergeability, UpdateDialect};
use super::differ;
use crate::failure::{ContextFrame, Failure, FailureCollector, FailureKind, FailureReport};
use crate::models::{AliasDefinition, DesiredIndex, IndexSchema, IndexSettings, MetadataView, RootMapping};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaOperation {
    CreateIfMissing,
    DropAndCreate,
    DropIfExisting,
    CreateOrValidate,
    CreateOrUpdate,
    Validate,
}

impl SchemaOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateIfMissing => "create-if-missing",
            Self::DropAndCreate => "drop-and-create",
            Self::DropIfExisting => "drop-if-existing",
            Self::CreateOrValidate => "create-or-validate",
            Self::CreateOrUpdate => "create-or-update",
            Self::Validate => "validate",
        }
    }

    /// Whether the operation needs the observed schema, not just existence.
    pub fn needs_schema(&self) -> bool {
        !matches!(self, Self::CreateIfMissing)
    }
}

impl fmt::Display for SchemaOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "create-if-missing" => Ok(Self::CreateIfMissing),
            "drop-and-create" => Ok(Self::DropAndCreate),
            "drop-if-existing" => Ok(Self::DropIfExisting),
            "create-or-validate" => Ok(Self::CreateOrValidate),
            "create-or-update" => Ok(Self::CreateOrUpdate),
            "validate" => Ok(Self::Validate),
            other => Err(format!("unknown schema operation '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchemaState {
    /// Before the existence probe.
    #[default]
    Unknown,
    Missing,
    Exists,
    Done,
    Failed,
}

impl SchemaState {
    /// Moves an `Unknown` operation to `Exists` or `Missing`. Any other state is kept.
    pub fn probed(self, exists: bool) -> Self {
        match self {
            Self::Unknown if exists => Self::Exists,
            Self::Unknown => Self::Missing,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaAction {
    CreateIndex {
        index: String,
        schema: IndexSchema,
        aliases: BTreeMap<String, AliasDefinition>,
    },
    DropIndex {
        index: String,
    },
    CloseIndex {
        index: String,
    },
    UpdateSettings {
        index: String,
        settings: IndexSettings,
    },
    OpenIndex {
        index: String,
    },
    UpdateMapping {
        index: String,
        mapping: RootMapping,
    },
    RemoveAlias {
        index: String,
        alias: String,
    },
    PutAlias {
        index: String,
        alias: String,
        definition: AliasDefinition,
    },
    WaitForStatus {
        index: String,
    },
}

impl SchemaAction {
    pub fn index(&self) -> &str {
        match self {
            Self::CreateIndex { index, .. }
            | Self::DropIndex { index }
            | Self::CloseIndex { index }
            | Self::UpdateSettings { index, .. }
            | Self::OpenIndex { index }
            | Self::UpdateMapping { index, .. }
            | Self::RemoveAlias { index, .. }
            | Self::PutAlias { index, .. }
            | Self::WaitForStatus { index } => index,
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::WaitForStatus { .. })
    }
}

impl fmt::Display for SchemaAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateIndex { index, .. } => write!(f, "create index '{index}'"),
            Self::DropIndex { index } => write!(f, "drop index '{index}'"),
            Self::CloseIndex { index } => write!(f, "close index '{index}'"),
            Self::UpdateSettings { index, .. } => write!(f, "update settings of '{index}'"),
            Self::OpenIndex { index } => write!(f, "open index '{index}'"),
            Self::UpdateMapping { index, .. } => write!(f, "update mapping of '{index}'"),
            Self::RemoveAlias { index, alias } => write!(f, "remove alias '{alias}' from '{index}'"),
            Self::PutAlias { index, alias, .. } => write!(f, "put alias '{alias}' on '{index}'"),
            Self::WaitForStatus { index } => write!(f, "wait for status of '{index}'"),
        }
    }
}

/// Why a planned operation ends in [`SchemaState::Failed`].
#[derive(Debug, Clone)]
pub enum PlanFailure {
    /// The observed schema does not satisfy the desired one.
    Invalid(FailureReport),
    /// An update could not apply every difference.
    Blocked(FailureReport),
}

impl PlanFailure {
    pub fn report(&self) -> &FailureReport {
        match self {
            Self::Invalid(report) | Self::Blocked(report) => report,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchemaPlan {
    pub operation: SchemaOperation,
    /// `Missing` or `Exists`, as probed.
    pub state: SchemaState,
    pub actions: Vec<SchemaAction>,
    /// Differences the actions resolve.
    pub applied: Vec<Failure>,
    pub failure: Option<PlanFailure>,
}

impl SchemaPlan {
    fn new(operation: SchemaOperation, exists: bool) -> Self {
        Self {
            operation,
            state: SchemaState::default().probed(exists),
            actions: Vec::new(),
            applied: Vec::new(),
            failure: None,
        }
    }

    /// The state the operation ends in once the actions have run.
    pub fn final_state(&self) -> SchemaState {
        if self.failure.is_some() {
            SchemaState::Failed
        } else {
            SchemaState::Done
        }
    }

    pub fn mutations(&self) -> impl Iterator<Item = &SchemaAction> {
        self.actions.iter().filter(|action| action.is_mutation())
    }
}

#[derive(Debug, Clone)]
pub struct ActionPlanner {
    layout: Arc<dyn IndexLayoutStrategy>,
    dialect: Arc<dyn UpdateDialect>,
}

impl ActionPlanner {
    pub fn new(layout: Arc<dyn IndexLayoutStrategy>, dialect: Arc<dyn UpdateDialect>) -> Self {
        Self { layout, dialect }
    }

    pub fn names(&self, index: &str) -> IndexNames {
        IndexNames::resolve(index, self.layout.as_ref())
    }

    pub fn plan(&self, operation: SchemaOperation, desired: &DesiredIndex, view: &MetadataView) -> SchemaPlan {
        let names = self.names(&desired.name);
        let mut plan = SchemaPlan::new(operation, !view.is_empty());

        match (operation, plan.state) {
            (
                SchemaOperation::CreateIfMissing
                | SchemaOperation::DropAndCreate
                | SchemaOperation::CreateOrValidate
                | SchemaOperation::CreateOrUpdate,
                SchemaState::Missing,
            ) => plan.actions = create_actions(&names, desired),
            (SchemaOperation::CreateIfMissing, _) | (SchemaOperation::DropIfExisting, SchemaState::Missing) => {}
            (SchemaOperation::DropAndCreate, _) => {
                plan.actions = drop_actions(view);
                plan.actions.extend(create_actions(&names, desired));
            }
            (SchemaOperation::DropIfExisting, _) => plan.actions = drop_actions(view),
            (SchemaOperation::Validate, SchemaState::Missing) => {
                let mut collector = FailureCollector::new();
                collector
                    .index(&desired.name)
                    .add(FailureKind::MissingIndex, "Missing index");
                plan.failure = Some(PlanFailure::Invalid(collector.into_failed_report()));
            }
            (SchemaOperation::Validate | SchemaOperation::CreateOrValidate, _) => {
                self.plan_validation(&names, desired, view, &mut plan)
            }
            (SchemaOperation::CreateOrUpdate, _) => self.plan_update(&names, desired, view, &mut plan),
        }
        plan
    }

    /// Plans an operation that only needs to know whether the index exists.
    pub fn plan_existence(&self, operation: SchemaOperation, desired: &DesiredIndex, exists: bool) -> SchemaPlan {
        debug_assert!(!operation.needs_schema());
        let mut plan = SchemaPlan::new(operation, exists);
        if !exists {
            plan.actions = create_actions(&self.names(&desired.name), desired);
        }
        plan
    }

    fn plan_validation(&self, names: &IndexNames, desired: &DesiredIndex, view: &MetadataView, plan: &mut SchemaPlan) {
        let mut collector = FailureCollector::new();
        let alias_plan = compare(names, desired, view, &mut collector);

        if collector.has_failures() {
            plan.failure = Some(PlanFailure::Invalid(collector.into_failed_report()));
        } else if let Some(target) = comparison_target(names, &alias_plan, view) {
            plan.actions.push(SchemaAction::WaitForStatus { index: target });
        }
    }

    fn plan_update(&self, names: &IndexNames, desired: &DesiredIndex, view: &MetadataView, plan: &mut SchemaPlan) {
        let mut collector = FailureCollector::new();
        let alias_plan = compare(names, desired, view, &mut collector);
        let Some(target) = comparison_target(names, &alias_plan, view) else {
            return;
        };

        if alias_plan.conflict {
            plan.failure = Some(PlanFailure::Blocked(collector.into_failed_report()));
            return;
        }

        let failures = collector.failures();
        if failures.is_empty() {
            plan.actions.push(SchemaAction::WaitForStatus { index: target });
            return;
        }

        let classified: Vec<(Failure, Mergeability)> = failures
            .into_iter()
            .map(|failure| {
                let mergeability = self.dialect.classify(&failure);
                (failure, mergeability)
            })
            .collect();
        let blocked = |section: Section| {
            classified
                .iter()
                .any(|(failure, mergeability)| mergeability.is_fatal() && Section::of(&failure.kind) == section)
        };
        let mapping_blocked = blocked(Section::Mapping);
        let aliases_blocked = blocked(Section::Aliases);

        let mut settings = IndexSettings::default();
        let mut settings_changed = false;
        let mut requires_close = false;
        let mut mapping_changed = false;
        let mut templates_changed = false;
        let mut blocked_report = FailureCollector::new();

        for (failure, mergeability) in &classified {
            let section = Section::of(&failure.kind);
            let applied = match mergeability {
                Mergeability::Fatal => {
                    blocked_report.add_at(&failure.context, FailureKind::UpdateBlocked, unable_message(failure));
                    false
                }
                Mergeability::Mergeable { requires_close: close } => match section {
                    Section::Settings => {
                        apply_setting(&mut settings, &desired.schema.settings, &failure.kind);
                        settings_changed = true;
                        requires_close |= *close;
                        true
                    }
                    Section::Mapping if !mapping_blocked => {
                        mapping_changed = true;
                        templates_changed |= is_template_failure(failure);
                        true
                    }
                    Section::Aliases if !aliases_blocked => true,
                    Section::Mapping | Section::Aliases | Section::Other => false,
                },
            };

            if applied {
                plan.applied.push(failure.clone());
            } else {
                blocked_report.add_at(&failure.context, failure.kind.clone(), failure.message.clone());
            }
        }

        if settings_changed {
            if requires_close {
                plan.actions.push(SchemaAction::CloseIndex { index: target.clone() });
            }
            plan.actions.push(SchemaAction::UpdateSettings {
                index: target.clone(),
                settings,
            });
            if requires_close {
                plan.actions.push(SchemaAction::OpenIndex { index: target.clone() });
            }
        }
        if mapping_changed {
            plan.actions.push(SchemaAction::UpdateMapping {
                index: target.clone(),
                mapping: partial_mapping(&desired.schema.mappings, templates_changed),
            });
        }
        if !aliases_blocked {
            for action in alias_plan.actions {
                match action {
                    AliasAction::Add { index, alias, definition } => {
                        plan.actions.push(SchemaAction::PutAlias { index, alias, definition });
                    }
                    AliasAction::Replace { index, alias, definition } => {
                        plan.actions.push(SchemaAction::RemoveAlias {
                            index: index.clone(),
                            alias: alias.clone(),
                        });
                        plan.actions.push(SchemaAction::PutAlias { index, alias, definition });
                    }
                }
            }
        }

        match blocked_report.into_report() {
            Some(report) => plan.failure = Some(PlanFailure::Blocked(report)),
            None => plan.actions.push(SchemaAction::WaitForStatus { index: target }),
        }
    }
}

/// Reconciles aliases and compares the schema of the index they resolve to.
fn compare(
    names: &IndexNames,
    desired: &DesiredIndex,
    view: &MetadataView,
    collector: &mut FailureCollector,
) -> AliasPlan {
    let mut context = collector.index(&desired.name);
    let alias_plan = alias::reconcile(names, view, &mut context);
    if let Some(observed) = comparison_target(names, &alias_plan, view).and_then(|target| view.get(&target)) {
        differ::compare_schema(&desired.schema, &observed.schema, &mut context);
    }
    alias_plan
}

/// The index whose schema is compared. On a layout conflict sibling
/// comparisons still run, against the initial primary when present.
fn comparison_target(names: &IndexNames, alias_plan: &AliasPlan, view: &MetadataView) -> Option<String> {
    alias_plan
        .primary
        .clone()
        .or_else(|| view.contains(&names.primary).then(|| names.primary.clone()))
        .or_else(|| view.index_names().next().map(str::to_owned))
}

fn create_actions(names: &IndexNames, desired: &DesiredIndex) -> Vec<SchemaAction> {
    vec![
        SchemaAction::CreateIndex {
            index: names.primary.clone(),
            schema: desired.schema.clone(),
            aliases: names.expected_aliases(),
        },
        SchemaAction::WaitForStatus {
            index: names.primary.clone(),
        },
    ]
}

fn drop_actions(view: &MetadataView) -> Vec<SchemaAction> {
    view.index_names()
        .map(|index| SchemaAction::DropIndex {
            index: index.to_owned(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Settings,
    Mapping,
    Aliases,
    Other,
}

impl Section {
    fn of(kind: &FailureKind) -> Self {
        match kind {
            FailureKind::Setting(_)
            | FailureKind::MissingAnalysisDefinition
            | FailureKind::AnalysisDefinition
            | FailureKind::MissingComponentDefinition(_) => Self::Settings,
            FailureKind::Dynamicness
            | FailureKind::MissingProperty
            | FailureKind::FieldAttribute(_)
            | FailureKind::RootAttribute(_)
            | FailureKind::MissingDynamicTemplate
            | FailureKind::DuplicateDynamicTemplate
            | FailureKind::DynamicTemplateOrder
            | FailureKind::DynamicTemplateAttribute => Self::Mapping,
            FailureKind::MissingAlias | FailureKind::AliasAttribute | FailureKind::LayoutConflict => Self::Aliases,
            FailureKind::MissingIndex | FailureKind::UpdateBlocked => Self::Other,
        }
    }
}

fn is_template_failure(failure: &Failure) -> bool {
    matches!(
        failure.kind,
        FailureKind::MissingDynamicTemplate
            | FailureKind::DuplicateDynamicTemplate
            | FailureKind::DynamicTemplateOrder
            | FailureKind::DynamicTemplateAttribute
    ) || failure
        .context
        .iter()
        .any(|frame| matches!(frame, ContextFrame::DynamicTemplate(_)))
}

fn apply_setting(target: &mut IndexSettings, desired: &IndexSettings, kind: &FailureKind) {
    match kind {
        FailureKind::Setting(key) => match key.as_str() {
            "number_of_shards" => target.number_of_shards = desired.number_of_shards,
            "number_of_replicas" => target.number_of_replicas = desired.number_of_replicas,
            "max_result_window" => target.max_result_window = desired.max_result_window,
            custom => {
                if let Some(value) = desired.custom_flat().remove(custom) {
                    target.set_custom(custom, value);
                }
            }
        },
        // Definitions are merged by name, so the whole desired analysis is sent.
        _ => target.analysis = desired.analysis.clone(),
    }
}

fn partial_mapping(desired: &RootMapping, with_templates: bool) -> RootMapping {
    RootMapping {
        dynamic: desired.dynamic,
        dynamic_templates: if with_templates {
            desired.dynamic_templates.clone()
        } else {
            Vec::new()
        },
        properties: desired.properties.clone(),
        extra: Default::default(),
    }
}

fn unable_message(failure: &Failure) -> String {
    match &failure.kind {
        FailureKind::Setting(key) => format!("Unable to update settings: index.{key}"),
        FailureKind::MissingAnalysisDefinition
        | FailureKind::AnalysisDefinition
        | FailureKind::MissingComponentDefinition(_) => "Unable to update settings: index.analysis".to_owned(),
        FailureKind::MissingAlias | FailureKind::AliasAttribute | FailureKind::LayoutConflict => {
            let alias = failure
                .context
                .iter()
                .find_map(|frame| match frame {
                    ContextFrame::Alias(name) => Some(name.as_str()),
                    _ => None,
                })
                .unwrap_or_default();
            format!("Unable to update aliases: {alias}")
        }
        _ => format!("Unable to update mapping: {}", failure.path()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ObservedIndex;
    use crate::schema::alias::SimpleLayout;
    use crate::schema::dialect::ElasticsearchDialect;
    use serde_json::json;

    fn planner() -> ActionPlanner {
        ActionPlanner::new(Arc::new(SimpleLayout), Arc::new(ElasticsearchDialect::default()))
    }

    fn desired() -> DesiredIndex {
        DesiredIndex::new(
            "books",
            serde_json::from_value(json!({
                "mappings": { "properties": { "title": { "type": "text" } } },
                "settings": { "number_of_shards": 1 }
            }))
            .unwrap(),
        )
    }

    fn existing(schema: serde_json::Value) -> MetadataView {
        let mut index: ObservedIndex = serde_json::from_value(schema).unwrap();
        index.aliases.insert("books-write".into(), AliasDefinition::write());
        index.aliases.insert("books-read".into(), AliasDefinition::read());
        let mut view = MetadataView::new();
        view.insert("books-000001", index);
        view
    }

    fn matching() -> MetadataView {
        existing(json!({
            "mappings": { "properties": { "title": { "type": "text" } } },
            "settings": { "index": { "number_of_shards": "1", "number_of_replicas": "1" } }
        }))
    }

    #[test]
    fn test_operation_names_round_trip() {
        for operation in [
            SchemaOperation::CreateIfMissing,
            SchemaOperation::DropAndCreate,
            SchemaOperation::DropIfExisting,
            SchemaOperation::CreateOrValidate,
            SchemaOperation::CreateOrUpdate,
            SchemaOperation::Validate,
        ] {
            assert_eq!(operation.as_str().parse::<SchemaOperation>(), Ok(operation));
        }
        assert_eq!("create_or_update".parse(), Ok(SchemaOperation::CreateOrUpdate));
        assert!("upsert".parse::<SchemaOperation>().is_err());
    }

    #[test]
    fn test_missing_index_is_created_with_aliases() {
        let plan = planner().plan(SchemaOperation::CreateOrValidate, &desired(), &MetadataView::new());
        assert_eq!(plan.state, SchemaState::Missing);
        assert_eq!(plan.final_state(), SchemaState::Done);
        match &plan.actions[0] {
            SchemaAction::CreateIndex { index, aliases, .. } => {
                assert_eq!(index, "books-000001");
                assert_eq!(aliases["books-write"], AliasDefinition::write());
                assert_eq!(aliases["books-read"], AliasDefinition::read());
            }
            other => panic!("unexpected action {other}"),
        }
        assert_eq!(
            plan.actions[1],
            SchemaAction::WaitForStatus {
                index: "books-000001".into()
            }
        );
    }

    #[test]
    fn test_existing_index_is_left_alone_by_create_if_missing() {
        let plan = planner().plan(SchemaOperation::CreateIfMissing, &desired(), &matching());
        assert_eq!(plan.state, SchemaState::Exists);
        assert!(plan.actions.is_empty());
        assert!(plan.failure.is_none());
    }

    #[test]
    fn test_drop_operations() {
        let plan = planner().plan(SchemaOperation::DropIfExisting, &desired(), &matching());
        assert_eq!(
            plan.actions,
            vec![SchemaAction::DropIndex {
                index: "books-000001".into()
            }]
        );
        let plan = planner().plan(SchemaOperation::DropIfExisting, &desired(), &MetadataView::new());
        assert!(plan.actions.is_empty());

        let plan = planner().plan(SchemaOperation::DropAndCreate, &desired(), &matching());
        let names: Vec<String> = plan.actions.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec![
                "drop index 'books-000001'",
                "create index 'books-000001'",
                "wait for status of 'books-000001'"
            ]
        );
    }

    #[test]
    fn test_validate_missing_index_fails() {
        let plan = planner().plan(SchemaOperation::Validate, &desired(), &MetadataView::new());
        assert_eq!(plan.final_state(), SchemaState::Failed);
        let report = plan.failure.unwrap();
        assert_eq!(report.report().failures()[0].message, "Missing index");
        assert!(plan.actions.is_empty());
    }

    #[test]
    fn test_validate_matching_index_only_waits() {
        let plan = planner().plan(SchemaOperation::Validate, &desired(), &matching());
        assert_eq!(plan.final_state(), SchemaState::Done);
        assert_eq!(plan.mutations().count(), 0);
    }

    #[test]
    fn test_validate_reports_differences_without_actions() {
        let view = existing(json!({
            "mappings": { "properties": { "title": { "type": "keyword" } } },
            "settings": { "index": { "number_of_shards": "1" } }
        }));
        let plan = planner().plan(SchemaOperation::CreateOrValidate, &desired(), &view);
        assert!(matches!(plan.failure, Some(PlanFailure::Invalid(_))));
        assert!(plan.actions.is_empty());
    }

    #[test]
    fn test_update_applies_mergeable_and_blocks_shards() {
        let mut desired = desired();
        desired.schema = serde_json::from_value(json!({
            "mappings": {
                "properties": {
                    "title": { "type": "text" },
                    "summary": { "type": "text", "analyzer": "folding" }
                }
            },
            "settings": {
                "number_of_shards": 3,
                "number_of_replicas": 2,
                "analysis": {
                    "analyzer": { "folding": { "type": "custom", "tokenizer": "standard", "filter": ["asciifolding"] } }
                }
            }
        }))
        .unwrap();

        let plan = planner().plan(SchemaOperation::CreateOrUpdate, &desired, &matching());
        let actions: Vec<String> = plan.actions.iter().map(ToString::to_string).collect();
        assert_eq!(
            actions,
            vec![
                "close index 'books-000001'",
                "update settings of 'books-000001'",
                "open index 'books-000001'",
                "update mapping of 'books-000001'",
            ]
        );
        match &plan.actions[1] {
            SchemaAction::UpdateSettings { settings, .. } => {
                assert_eq!(settings.number_of_shards, None);
                assert_eq!(settings.number_of_replicas, Some(2));
                assert!(settings.analysis.analyzer.contains_key("folding"));
            }
            other => panic!("unexpected action {other}"),
        }

        let Some(PlanFailure::Blocked(report)) = &plan.failure else {
            panic!("update should be blocked");
        };
        assert_eq!(
            report.failures_at(&[
                ContextFrame::Index("books".into()),
                ContextFrame::setting("number_of_shards"),
            ]),
            vec![
                "Unable to update settings: index.number_of_shards",
                "Invalid value. Expected '3', actual is '1'."
            ]
        );
        assert_eq!(plan.applied.len(), 3);
    }

    #[test]
    fn test_fatal_mapping_difference_skips_mapping_update() {
        let mut desired = desired();
        desired.schema = serde_json::from_value(json!({
            "mappings": {
                "properties": { "title": { "type": "keyword" }, "added": { "type": "long" } }
            }
        }))
        .unwrap();

        let plan = planner().plan(SchemaOperation::CreateOrUpdate, &desired, &matching());
        assert_eq!(plan.mutations().count(), 0);
        let Some(PlanFailure::Blocked(report)) = &plan.failure else {
            panic!("update should be blocked");
        };
        let books = ContextFrame::Index("books".into());
        assert_eq!(
            report.failures_at(&[books.clone(), ContextFrame::field("title"), ContextFrame::attribute("type")]),
            vec![
                "Unable to update mapping: title.type",
                "Invalid value. Expected 'keyword', actual is 'text'.",
            ]
        );
        assert_eq!(
            report.failures_at(&[books, ContextFrame::field("added")]),
            vec!["Missing property mapping"]
        );
        assert_eq!(report.failures().len(), 3);
        assert!(plan.applied.is_empty());
    }

    #[test]
    fn test_update_orders_settings_mapping_then_aliases() {
        let mut desired = desired();
        desired.schema = serde_json::from_value(json!({
            "mappings": {
                "properties": {
                    "title": { "type": "text" },
                    "summary": { "type": "text", "analyzer": "folding" }
                }
            },
            "settings": {
                "number_of_shards": 1,
                "analysis": {
                    "analyzer": { "folding": { "type": "custom", "tokenizer": "standard", "filter": ["asciifolding"] } }
                }
            }
        }))
        .unwrap();
        let mut view = matching();
        let mut index = view.get("books-000001").cloned().unwrap();
        index.aliases.insert("books-read".into(), AliasDefinition::write());
        view.insert("books-000001", index);

        let plan = planner().plan(SchemaOperation::CreateOrUpdate, &desired, &view);
        assert!(plan.failure.is_none());
        assert_eq!(plan.state, SchemaState::Exists);
        let actions: Vec<String> = plan.actions.iter().map(ToString::to_string).collect();
        assert_eq!(
            actions,
            vec![
                "close index 'books-000001'",
                "update settings of 'books-000001'",
                "open index 'books-000001'",
                "update mapping of 'books-000001'",
                "remove alias 'books-read' from 'books-000001'",
                "put alias 'books-read' on 'books-000001'",
                "wait for status of 'books-000001'",
            ]
        );
    }

    #[test]
    fn test_state_is_unknown_until_existence_is_known() {
        assert_eq!(SchemaState::default(), SchemaState::Unknown);
        assert_eq!(SchemaState::Unknown.probed(true), SchemaState::Exists);
        assert_eq!(SchemaState::Unknown.probed(false), SchemaState::Missing);
        assert_eq!(SchemaState::Exists.probed(false), SchemaState::Exists);
        let plan = planner().plan_existence(SchemaOperation::CreateIfMissing, &desired(), false);
        assert_eq!(plan.state, SchemaState::Missing);
    }

    #[test]
    fn test_update_repairs_aliases() {
        let mut view = matching();
        let mut index = view.get("books-000001").cloned().unwrap();
        index.aliases.remove("books-read");
        view.insert("books-000001", index);

        let plan = planner().plan(SchemaOperation::CreateOrUpdate, &desired(), &view);
        assert!(plan.failure.is_none());
        assert_eq!(
            plan.actions[0],
            SchemaAction::PutAlias {
                index: "books-000001".into(),
                alias: "books-read".into(),
                definition: AliasDefinition::read(),
            }
        );
    }

    #[test]
    fn test_layout_conflict_blocks_every_mutation() {
        let mut view = matching();
        view.insert(
            "books-000002",
            ObservedIndex {
                aliases: [("books-write".to_owned(), AliasDefinition::write())].into(),
                ..Default::default()
            },
        );

        for operation in [SchemaOperation::CreateOrUpdate, SchemaOperation::CreateOrValidate] {
            let plan = planner().plan(operation, &desired(), &view);
            assert_eq!(plan.mutations().count(), 0);
            let failures = plan.failure.unwrap().report().failures();
            assert_eq!(failures.len(), 1);
            assert!(failures[0].message.starts_with("Invalid index layout"));
            assert!(failures[0].message.contains("[books-000001, books-000002]"));
        }
    }
}
