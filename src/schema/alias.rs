//! Index layout strategies and alias reconciliation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use super::compare;
use crate::failure::{ContextFrame, ContextualFailureCollector, FailureKind};
use crate::models::{AliasDefinition, MetadataView};

/// Maps a logical index name to the physical index and aliases it is served by.
pub trait IndexLayoutStrategy: fmt::Debug + Send + Sync {
    /// Name of the primary index created for a logical index.
    fn primary_index(&self, index: &str) -> String;

    fn write_alias(&self, index: &str) -> Option<String>;

    fn read_alias(&self, index: &str) -> Option<String>;
}

/// `<name>-000001`, written through `<name>-write` and read through `<name>-read`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleLayout;

impl IndexLayoutStrategy for SimpleLayout {
    fn primary_index(&self, index: &str) -> String {
        format!("{index}-000001")
    }

    fn write_alias(&self, index: &str) -> Option<String> {
        Some(format!("{index}-write"))
    }

    fn read_alias(&self, index: &str) -> Option<String> {
        Some(format!("{index}-read"))
    }
}

/// The logical name is the index itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAliasLayout;

impl IndexLayoutStrategy for NoAliasLayout {
    fn primary_index(&self, index: &str) -> String {
        index.to_owned()
    }

    fn write_alias(&self, _index: &str) -> Option<String> {
        None
    }

    fn read_alias(&self, _index: &str) -> Option<String> {
        None
    }
}

/// Patterns with a `{name}` placeholder. An empty alias pattern disables the alias.
#[derive(Debug, Clone)]
pub struct CustomLayout {
    pub primary: String,
    pub write_alias: String,
    pub read_alias: String,
}

impl CustomLayout {
    fn expand(pattern: &str, index: &str) -> Option<String> {
        (!pattern.is_empty()).then(|| pattern.replace("{name}", index))
    }
}

impl IndexLayoutStrategy for CustomLayout {
    fn primary_index(&self, index: &str) -> String {
        Self::expand(&self.primary, index).unwrap_or_else(|| index.to_owned())
    }

    fn write_alias(&self, index: &str) -> Option<String> {
        Self::expand(&self.write_alias, index)
    }

    fn read_alias(&self, index: &str) -> Option<String> {
        Self::expand(&self.read_alias, index)
    }
}

/// Layout strategies by name, filled at startup and selected by configuration.
#[derive(Debug, Clone)]
pub struct LayoutRegistry {
    strategies: HashMap<String, Arc<dyn IndexLayoutStrategy>>,
}

impl LayoutRegistry {
    pub const DEFAULT: &'static str = "simple";

    /// A registry holding `simple` and `no-alias`.
    pub fn new() -> Self {
        let mut registry = Self {
            strategies: HashMap::new(),
        };
        registry.register(Self::DEFAULT, SimpleLayout);
        registry.register("no-alias", NoAliasLayout);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, strategy: impl IndexLayoutStrategy + 'static) {
        self.strategies.insert(name.into(), Arc::new(strategy));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn IndexLayoutStrategy>> {
        self.strategies.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for LayoutRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Physical names of one logical index under a layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNames {
    pub index: String,
    pub primary: String,
    pub write_alias: Option<String>,
    pub read_alias: Option<String>,
}

impl IndexNames {
    pub fn resolve(index: &str, layout: &dyn IndexLayoutStrategy) -> Self {
        Self {
            index: index.to_owned(),
            primary: layout.primary_index(index),
            write_alias: layout.write_alias(index),
            read_alias: layout.read_alias(index),
        }
    }

    /// Names whose resolution makes up the observed metadata view.
    pub fn probe_targets(&self) -> Vec<String> {
        let mut targets = Vec::new();
        for name in [&self.write_alias, &self.read_alias]
            .into_iter()
            .flatten()
            .chain(std::iter::once(&self.primary))
        {
            if !targets.contains(name) {
                targets.push(name.clone());
            }
        }
        targets
    }

    pub fn expected_aliases(&self) -> BTreeMap<String, AliasDefinition> {
        let mut aliases = BTreeMap::new();
        if let Some(write) = &self.write_alias {
            aliases.insert(write.clone(), AliasDefinition::write());
        }
        if let Some(read) = &self.read_alias {
            aliases.insert(read.clone(), AliasDefinition::read());
        }
        aliases
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AliasAction {
    Add {
        index: String,
        alias: String,
        definition: AliasDefinition,
    },
    /// Aliases cannot be altered in place: remove, then add again.
    Replace {
        index: String,
        alias: String,
        definition: AliasDefinition,
    },
}

impl AliasAction {
    pub fn alias(&self) -> &str {
        match self {
            Self::Add { alias, .. } | Self::Replace { alias, .. } => alias,
        }
    }
}

/// Outcome of reconciling the expected aliases with a metadata view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasPlan {
    /// The concrete index the aliases resolve to, when it can be determined.
    pub primary: Option<String>,
    pub actions: Vec<AliasAction>,
    pub conflict: bool,
}

/// Determines the primary index and the alias actions that would bring the
/// view in line with the layout. Third-party aliases are never touched.
///
/// Differences are recorded in `collector`. When the aliases resolve
/// inconsistently a single layout failure is recorded and no action is planned.
pub fn reconcile(
    names: &IndexNames,
    view: &MetadataView,
    collector: &mut ContextualFailureCollector<'_>,
) -> AliasPlan {
    let write_targets = names
        .write_alias
        .as_deref()
        .map(|alias| view.indexes_with_alias(alias))
        .unwrap_or_default();
    let read_targets = names
        .read_alias
        .as_deref()
        .map(|alias| view.indexes_with_alias(alias))
        .unwrap_or_default();

    let inconsistent = write_targets.len() > 1
        || read_targets.len() > 1
        || (!write_targets.is_empty() && !read_targets.is_empty() && write_targets != read_targets);
    if inconsistent {
        let resolved: BTreeSet<&str> = write_targets
            .iter()
            .chain(&read_targets)
            .map(String::as_str)
            .collect();
        collector.add(FailureKind::LayoutConflict, layout_conflict_message(names, &resolved));
        return AliasPlan {
            primary: None,
            actions: Vec::new(),
            conflict: true,
        };
    }

    let primary = write_targets
        .into_iter()
        .chain(read_targets)
        .next()
        .or_else(|| view.contains(&names.primary).then(|| names.primary.clone()));
    let Some(primary) = primary else {
        return AliasPlan::default();
    };

    let observed = view
        .get(&primary)
        .map(|index| &index.aliases)
        .cloned()
        .unwrap_or_default();
    let mut actions = Vec::new();
    for (alias, expected) in names.expected_aliases() {
        let mut context = collector.with_context(ContextFrame::Alias(alias.clone()));
        match observed.get(&alias) {
            None => {
                context.add(FailureKind::MissingAlias, "Missing alias");
                actions.push(AliasAction::Add {
                    index: primary.clone(),
                    alias,
                    definition: expected,
                });
            }
            Some(actual) => {
                if !compare_alias(&expected, actual, &mut context) {
                    actions.push(AliasAction::Replace {
                        index: primary.clone(),
                        alias,
                        definition: expected,
                    });
                }
            }
        }
    }

    AliasPlan {
        primary: Some(primary),
        actions,
        conflict: false,
    }
}

/// `true` when the observed definition satisfies the expected one.
fn compare_alias(
    expected: &AliasDefinition,
    actual: &AliasDefinition,
    context: &mut ContextualFailureCollector<'_>,
) -> bool {
    compare::validate_exact(
        context,
        "is_write_index",
        FailureKind::AliasAttribute,
        expected.is_write_index.as_ref(),
        actual.is_write_index.as_ref(),
        Some(&false),
    );
    let filter_matches = match (&expected.filter, &actual.filter) {
        (None, None) => true,
        (Some(e), Some(a)) => compare::values_equal(e, a, &[], None),
        _ => false,
    };
    if !filter_matches {
        compare::record(
            context,
            "filter",
            FailureKind::AliasAttribute,
            compare::AttributeMatch::Mismatch,
            compare::render_option(expected.filter.as_ref()),
            compare::render_option(actual.filter.as_ref()),
        );
    }
    compare::validate_exact(
        context,
        "index_routing",
        FailureKind::AliasAttribute,
        expected.index_routing.as_deref(),
        actual.index_routing.as_deref(),
        None,
    );
    compare::validate_exact(
        context,
        "search_routing",
        FailureKind::AliasAttribute,
        expected.search_routing.as_deref(),
        actual.search_routing.as_deref(),
        None,
    );
    !context.has_failures()
}

fn layout_conflict_message(names: &IndexNames, resolved: &BTreeSet<&str>) -> String {
    let resolved = resolved.iter().copied().collect::<Vec<_>>().join(", ");
    match (&names.write_alias, &names.read_alias) {
        (Some(write), Some(read)) => format!(
            "Invalid index layout: aliases '{write}' and '{read}' must resolve to exactly one, \
             and the same, primary index, but they resolve to [{resolved}]."
        ),
        (Some(alias), None) | (None, Some(alias)) => format!(
            "Invalid index layout: alias '{alias}' must resolve to exactly one primary index, \
             but it resolves to [{resolved}]."
        ),
        (None, None) => format!("Invalid index layout: resolved to [{resolved}]."),
    }
}
