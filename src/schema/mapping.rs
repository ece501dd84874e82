use indexmap::IndexMap;

use super::compare::{self, AttributeMatch};
use crate::failure::{ContextFrame, ContextualFailureCollector, FailureKind};
use crate::models::{Dynamicness, FieldMapping, NamedDynamicTemplate, RootMapping};

/// Parameters the store treats as sets rather than sequences.
pub(crate) const UNORDERED_PARAMETERS: &[&str] = &["token_chars", "types"];

/// Compares the root of a mapping: dynamicness, root attributes, properties
/// and dynamic templates.
pub fn compare_root(
    desired: &RootMapping,
    observed: &RootMapping,
    collector: &mut ContextualFailureCollector<'_>,
) {
    compare::validate_exact(
        collector,
        "dynamic",
        FailureKind::Dynamicness,
        desired.dynamic.as_ref(),
        observed.dynamic.as_ref(),
        Some(&Dynamicness::True),
    );

    for (attribute, expected) in &desired.extra {
        compare::compare_values(
            expected,
            observed.extra.get(attribute),
            UNORDERED_PARAMETERS,
            Some(attribute),
            &FailureKind::RootAttribute(attribute.clone()),
            &mut collector.with_context(ContextFrame::attribute(attribute.as_str())),
        );
    }

    compare_properties(&desired.properties, &observed.properties, collector);
    compare_dynamic_templates(&desired.dynamic_templates, &observed.dynamic_templates, collector);
}

/// Observed properties the desired mapping does not declare are ignored.
pub fn compare_properties(
    desired: &IndexMap<String, FieldMapping>,
    observed: &IndexMap<String, FieldMapping>,
    collector: &mut ContextualFailureCollector<'_>,
) {
    for (name, expected) in desired {
        let mut field = collector.with_context(ContextFrame::field(name.as_str()));
        match observed.get(name) {
            None => field.add(FailureKind::MissingProperty, "Missing property mapping"),
            Some(actual) => compare_field(expected, actual, &mut field),
        }
    }
}

pub fn compare_field(
    expected: &FieldMapping,
    actual: &FieldMapping,
    collector: &mut ContextualFailureCollector<'_>,
) {
    // A type mismatch does not stop the walk; the other attributes are still reported.
    compare::validate_exact(
        collector,
        "type",
        attribute_kind("type"),
        Some(expected.effective_type()),
        Some(actual.effective_type()),
        None,
    );

    if expected.is_object() {
        compare::validate_exact(
            collector,
            "dynamic",
            FailureKind::Dynamicness,
            expected.dynamic.as_ref(),
            actual.dynamic.as_ref(),
            None,
        );
        compare_properties(&expected.properties, &actual.properties, collector);
        compare_extra(expected, actual, collector);
        return;
    }

    compare_capability(collector, "index", expected.index, actual.index, true);
    compare_capability(
        collector,
        "doc_values",
        expected.doc_values,
        actual.doc_values,
        !expected.is_text(),
    );

    let default_norms = expected.is_text();
    compare::validate_exact(
        collector,
        "norms",
        attribute_kind("norms"),
        expected.norms.as_ref(),
        actual.norms.as_ref(),
        Some(&default_norms),
    );
    compare::validate_exact(
        collector,
        "store",
        attribute_kind("store"),
        expected.store.as_ref(),
        actual.store.as_ref(),
        Some(&false),
    );

    compare::validate_exact(
        collector,
        "analyzer",
        attribute_kind("analyzer"),
        expected.analyzer.as_deref(),
        actual.analyzer.as_deref(),
        None,
    );
    // The store omits search_analyzer when it equals analyzer.
    compare::validate_exact(
        collector,
        "search_analyzer",
        attribute_kind("search_analyzer"),
        expected.search_analyzer.as_deref().or(expected.analyzer.as_deref()),
        actual.search_analyzer.as_deref().or(actual.analyzer.as_deref()),
        None,
    );
    compare::validate_exact(
        collector,
        "normalizer",
        attribute_kind("normalizer"),
        expected.normalizer.as_deref(),
        actual.normalizer.as_deref(),
        None,
    );

    if let Err(message) = compare::formats(&expected.format, &actual.format) {
        collector
            .with_context(ContextFrame::attribute("format"))
            .add(attribute_kind("format"), message);
    }

    let null_value = if expected.is_floating_point() {
        compare::numeric(expected.null_value.as_ref(), actual.null_value.as_ref())
    } else {
        compare::scalar(expected.null_value.as_ref(), actual.null_value.as_ref())
    };
    compare::record(
        collector,
        "null_value",
        attribute_kind("null_value"),
        null_value,
        compare::render_option(expected.null_value.as_ref()),
        compare::render_option(actual.null_value.as_ref()),
    );

    compare::record(
        collector,
        "scaling_factor",
        attribute_kind("scaling_factor"),
        compare::float(expected.scaling_factor, actual.scaling_factor),
        compare::show(expected.scaling_factor.as_ref()),
        compare::show(actual.scaling_factor.as_ref()),
    );

    compare::validate_exact(
        collector,
        "term_vector",
        attribute_kind("term_vector"),
        expected.term_vector.as_deref(),
        actual.term_vector.as_deref(),
        Some("no"),
    );

    // Vector parameters are inferred or defaulted by the store when left out.
    if expected.dims.is_some() {
        compare::validate_exact(
            collector,
            "dims",
            attribute_kind("dims"),
            expected.dims.as_ref(),
            actual.dims.as_ref(),
            None,
        );
    }
    if expected.similarity.is_some() {
        compare::validate_exact(
            collector,
            "similarity",
            attribute_kind("similarity"),
            expected.similarity.as_deref(),
            actual.similarity.as_deref(),
            None,
        );
    }
    if let Some(index_options) = &expected.index_options {
        compare::compare_values(
            index_options,
            actual.index_options.as_ref(),
            UNORDERED_PARAMETERS,
            Some("index_options"),
            &attribute_kind("index_options"),
            &mut collector.with_context(ContextFrame::attribute("index_options")),
        );
    }

    compare_extra(expected, actual, collector);
}

fn compare_extra(
    expected: &FieldMapping,
    actual: &FieldMapping,
    collector: &mut ContextualFailureCollector<'_>,
) {
    for (attribute, value) in &expected.extra {
        compare::compare_values(
            value,
            actual.extra.get(attribute),
            UNORDERED_PARAMETERS,
            Some(attribute),
            &attribute_kind(attribute),
            &mut collector.with_context(ContextFrame::attribute(attribute.as_str())),
        );
    }
}

fn compare_capability(
    collector: &mut ContextualFailureCollector<'_>,
    attribute: &str,
    expected: Option<bool>,
    actual: Option<bool>,
    store_default: bool,
) {
    let outcome = compare::capability(expected, actual, store_default);
    if outcome == AttributeMatch::Mismatch {
        let expected = expected.unwrap_or(store_default);
        compare::record(
            collector,
            attribute,
            attribute_kind(attribute),
            outcome,
            expected,
            compare::show(actual.as_ref()),
        );
    }
}

fn attribute_kind(attribute: &str) -> FailureKind {
    FailureKind::FieldAttribute(attribute.to_owned())
}

/// Templates are matched by name. Their relative order is part of the
/// contract because the store applies the first matching template.
pub fn compare_dynamic_templates(
    desired: &[NamedDynamicTemplate],
    observed: &[NamedDynamicTemplate],
    collector: &mut ContextualFailureCollector<'_>,
) {
    for expected in desired {
        let mut matches = observed.iter().filter(|t| t.name == expected.name);
        let mut template = collector.with_context(ContextFrame::DynamicTemplate(expected.name.clone()));
        match (matches.next(), matches.next()) {
            (None, _) => template.add(
                FailureKind::MissingDynamicTemplate,
                "Missing dynamic field template",
            ),
            (Some(_), Some(_)) => template.add(
                FailureKind::DuplicateDynamicTemplate,
                "Multiple dynamic field templates with this name",
            ),
            (Some(actual), None) => compare_dynamic_template(expected, actual, &mut template),
        }
    }

    if !is_order_preserved(desired, observed) {
        collector.add(
            FailureKind::DynamicTemplateOrder,
            format!(
                "Invalid order for dynamic field templates. Expected [{}], actual is [{}].",
                template_names(desired),
                template_names(observed)
            ),
        );
    }
}

fn compare_dynamic_template(
    expected: &NamedDynamicTemplate,
    actual: &NamedDynamicTemplate,
    collector: &mut ContextualFailureCollector<'_>,
) {
    let (e, a) = (&expected.template, &actual.template);
    for (attribute, expected_value, actual_value) in [
        ("match_mapping_type", &e.match_mapping_type, &a.match_mapping_type),
        ("path_match", &e.path_match, &a.path_match),
        ("path_unmatch", &e.path_unmatch, &a.path_unmatch),
        ("match", &e.match_pattern, &a.match_pattern),
        ("unmatch", &e.unmatch, &a.unmatch),
    ] {
        compare::validate_exact(
            collector,
            attribute,
            FailureKind::DynamicTemplateAttribute,
            expected_value.as_deref(),
            actual_value.as_deref(),
            None,
        );
    }

    compare_field(
        &e.mapping,
        &a.mapping,
        &mut collector.with_context(ContextFrame::attribute("mapping")),
    );

    for (attribute, value) in &e.extra {
        compare::compare_values(
            value,
            a.extra.get(attribute),
            UNORDERED_PARAMETERS,
            Some(attribute),
            &FailureKind::DynamicTemplateAttribute,
            &mut collector.with_context(ContextFrame::attribute(attribute.as_str())),
        );
    }
}

/// Desired templates present in the store must appear in the same relative
/// order, with no foreign template between two of them.
fn is_order_preserved(desired: &[NamedDynamicTemplate], observed: &[NamedDynamicTemplate]) -> bool {
    let is_desired = |name: &str| desired.iter().any(|t| t.name == name);

    let positions: Vec<usize> = desired
        .iter()
        .filter_map(|expected| observed.iter().position(|t| t.name == expected.name))
        .collect();
    if positions.windows(2).any(|pair| pair[0] >= pair[1]) {
        return false;
    }

    match (positions.first(), positions.last()) {
        (Some(&first), Some(&last)) => observed[first..=last]
            .iter()
            .all(|template| is_desired(&template.name)),
        _ => true,
    }
}

fn template_names(templates: &[NamedDynamicTemplate]) -> String {
    templates
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
