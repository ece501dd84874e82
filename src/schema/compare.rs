//! Per-attribute comparison policies.
//!
//! Every policy answers the same question for one attribute: does the value
//! observed in the store satisfy the value the application expects?

use serde_json::Value;
use std::fmt::Display;

use crate::failure::{ContextFrame, ContextualFailureCollector, FailureKind};
use crate::models::lenient::as_f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeMatch {
    Match,
    /// Equal once a missing side is replaced by the attribute's default.
    MatchViaDefault,
    Mismatch,
}

impl AttributeMatch {
    pub fn is_match(self) -> bool {
        !matches!(self, Self::Mismatch)
    }
}

/// Literal equality. A missing side stands for `default`, when there is one.
pub fn exact<T: PartialEq + ?Sized>(
    expected: Option<&T>,
    actual: Option<&T>,
    default: Option<&T>,
) -> AttributeMatch {
    match (expected, actual) {
        (None, None) => AttributeMatch::Match,
        (Some(e), Some(a)) if e == a => AttributeMatch::Match,
        _ => match (expected.or(default), actual.or(default)) {
            (Some(e), Some(a)) if e == a => AttributeMatch::MatchViaDefault,
            _ => AttributeMatch::Mismatch,
        },
    }
}

/// Boolean flag derived from a capability (`index` from searchable,
/// `doc_values` from sortable/projectable/aggregable).
///
/// `Some(true)`: the capability is required, the store must have the flag on.
/// `Some(false)`: the capability is not needed, any value is acceptable.
/// `None`: left at the default, the store must have its own default.
pub fn capability(expected: Option<bool>, actual: Option<bool>, store_default: bool) -> AttributeMatch {
    match (expected, actual) {
        (Some(false), _) => AttributeMatch::Match,
        (Some(true), Some(true)) => AttributeMatch::Match,
        (Some(true), None) if store_default => AttributeMatch::MatchViaDefault,
        (Some(true), _) => AttributeMatch::Mismatch,
        (None, None) => AttributeMatch::MatchViaDefault,
        (None, Some(value)) if value == store_default => AttributeMatch::MatchViaDefault,
        (None, Some(_)) => AttributeMatch::Mismatch,
    }
}

/// Numeric value equality: `1.0`, `1` and `"1"` are the same value.
pub fn numeric(expected: Option<&Value>, actual: Option<&Value>) -> AttributeMatch {
    match (expected, actual) {
        (None, None) => AttributeMatch::Match,
        (Some(e), Some(a)) => match (as_f64(e), as_f64(a)) {
            (Some(x), Some(y)) if x == y => AttributeMatch::Match,
            _ if scalar_eq(e, a) => AttributeMatch::Match,
            _ => AttributeMatch::Mismatch,
        },
        _ => AttributeMatch::Mismatch,
    }
}

pub fn float(expected: Option<f64>, actual: Option<f64>) -> AttributeMatch {
    match (expected, actual) {
        (None, None) => AttributeMatch::Match,
        (Some(e), Some(a)) if e == a => AttributeMatch::Match,
        _ => AttributeMatch::Mismatch,
    }
}

/// Equality that tolerates the store's string representation of scalars.
pub fn scalar(expected: Option<&Value>, actual: Option<&Value>) -> AttributeMatch {
    match (expected, actual) {
        (None, None) => AttributeMatch::Match,
        (Some(e), Some(a)) if scalar_eq(e, a) => AttributeMatch::Match,
        _ => AttributeMatch::Mismatch,
    }
}

pub fn scalar_eq(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Object(_) | Value::Array(_), _) | (_, Value::Object(_) | Value::Array(_)) => {
            expected == actual
        }
        _ => render(expected) == render(actual),
    }
}

/// Date formats: the first element is the output format and must match
/// exactly, the rest is a set.
///
/// Returns the failure message when the lists disagree.
pub fn formats(expected: &[String], actual: &[String]) -> Result<AttributeMatch, String> {
    let Some(output_format) = expected.first() else {
        return Ok(AttributeMatch::MatchViaDefault);
    };

    let mut sentences = Vec::new();
    if actual.first() != Some(output_format) {
        sentences.push(format!(
            "The output format (the first element) is invalid. Expected '{output_format}', actual is '{}'.",
            actual.first().map_or("null", String::as_str)
        ));
    }
    let missing: Vec<&str> = expected
        .iter()
        .filter(|format| !actual.contains(format))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        sentences.push(format!(
            "The following formats are missing: [{}].",
            missing.join(", ")
        ));
    }
    let unexpected: Vec<&str> = actual
        .iter()
        .filter(|format| !expected.contains(format))
        .map(String::as_str)
        .collect();
    if !unexpected.is_empty() {
        sentences.push(format!(
            "The following formats are unexpected: [{}].",
            unexpected.join(", ")
        ));
    }

    if sentences.is_empty() {
        Ok(AttributeMatch::Match)
    } else {
        Err(sentences.join(" "))
    }
}

/// Structural equality of opaque JSON. Arrays under a key listed in
/// `unordered` are compared as multisets.
pub fn values_equal(expected: &Value, actual: &Value, unordered: &[&str], key: Option<&str>) -> bool {
    match (expected, actual) {
        (Value::Object(e), Value::Object(a)) => {
            e.len() == a.len()
                && e.iter().all(|(k, ev)| {
                    a.get(k)
                        .is_some_and(|av| values_equal(ev, av, unordered, Some(k)))
                })
        }
        (Value::Array(e), Value::Array(a)) => {
            if key.is_some_and(|key| unordered.contains(&key)) {
                same_elements(e, a)
            } else {
                e.len() == a.len()
                    && e.iter()
                        .zip(a)
                        .all(|(ev, av)| values_equal(ev, av, unordered, None))
            }
        }
        _ => scalar_eq(expected, actual),
    }
}

fn same_elements(expected: &[Value], actual: &[Value]) -> bool {
    let mut e: Vec<String> = expected.iter().map(render).collect();
    let mut a: Vec<String> = actual.iter().map(render).collect();
    e.sort();
    a.sort();
    e == a
}

/// Compares opaque JSON and records each difference at the deepest object
/// key where the two sides diverge.
pub fn compare_values(
    expected: &Value,
    actual: Option<&Value>,
    unordered: &[&str],
    key: Option<&str>,
    kind: &FailureKind,
    collector: &mut ContextualFailureCollector<'_>,
) {
    match (expected, actual) {
        (Value::Object(e), Some(Value::Object(a))) => {
            for (child_key, child_expected) in e {
                compare_values(
                    child_expected,
                    a.get(child_key),
                    unordered,
                    Some(child_key),
                    kind,
                    &mut collector.with_context(ContextFrame::attribute(child_key.as_str())),
                );
            }
            for child_key in a.keys().filter(|k| !e.contains_key(*k)) {
                collector
                    .with_context(ContextFrame::attribute(child_key.as_str()))
                    .add(
                        kind.clone(),
                        invalid_value("null", render_option(a.get(child_key))),
                    );
            }
        }
        (_, Some(actual)) if values_equal(expected, actual, unordered, key) => {}
        (_, actual) => {
            collector.add(kind.clone(), invalid_value(render(expected), render_option(actual)));
        }
    }
}

pub fn invalid_value(expected: impl Display, actual: impl Display) -> String {
    format!("Invalid value. Expected '{expected}', actual is '{actual}'.")
}

/// Displays an optional attribute value, `null` when absent.
pub fn show<T: Display + ?Sized>(value: Option<&T>) -> String {
    value.map_or_else(|| "null".to_owned(), ToString::to_string)
}

/// Strings without quotes, everything else as JSON.
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn render_option(value: Option<&Value>) -> String {
    value.map_or_else(|| "null".to_owned(), render)
}

/// Records an "invalid value" failure under `attribute` when `outcome` is a mismatch.
pub fn record(
    collector: &mut ContextualFailureCollector<'_>,
    attribute: &str,
    kind: FailureKind,
    outcome: AttributeMatch,
    expected: impl Display,
    actual: impl Display,
) {
    if !outcome.is_match() {
        collector
            .with_context(ContextFrame::attribute(attribute))
            .add(kind, invalid_value(expected, actual));
    }
}

/// [`exact`] followed by [`record`].
pub fn validate_exact<T: PartialEq + Display + ?Sized>(
    collector: &mut ContextualFailureCollector<'_>,
    attribute: &str,
    kind: FailureKind,
    expected: Option<&T>,
    actual: Option<&T>,
    default: Option<&T>,
) {
    let outcome = exact(expected, actual, default);
    record(collector, attribute, kind, outcome, show(expected), show(actual));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::FailureCollector;
    use serde_json::json;

    #[test]
    fn test_exact_uses_default_for_missing_side() {
        assert_eq!(exact(Some("a"), Some("a"), None), AttributeMatch::Match);
        assert_eq!(exact::<str>(None, None, None), AttributeMatch::Match);
        assert_eq!(
            exact(Some("true"), None, Some("true")),
            AttributeMatch::MatchViaDefault
        );
        assert_eq!(exact(Some("a"), None, None), AttributeMatch::Mismatch);
        assert_eq!(exact(None, Some("a"), None), AttributeMatch::Mismatch);
        assert_eq!(exact(Some("a"), Some("b"), Some("a")), AttributeMatch::Mismatch);
    }

    #[test]
    fn test_capability_not_needed_accepts_anything() {
        for actual in [Some(true), Some(false), None] {
            assert!(capability(Some(false), actual, true).is_match());
        }
    }

    #[test]
    fn test_capability_required_needs_flag_on() {
        assert_eq!(capability(Some(true), Some(true), true), AttributeMatch::Match);
        assert_eq!(
            capability(Some(true), None, true),
            AttributeMatch::MatchViaDefault
        );
        assert_eq!(capability(Some(true), Some(false), true), AttributeMatch::Mismatch);
        assert_eq!(capability(Some(true), None, false), AttributeMatch::Mismatch);
    }

    #[test]
    fn test_capability_default_accepts_absence_only() {
        assert_eq!(capability(None, None, true), AttributeMatch::MatchViaDefault);
        assert_eq!(
            capability(None, Some(true), true),
            AttributeMatch::MatchViaDefault
        );
        assert_eq!(capability(None, Some(false), true), AttributeMatch::Mismatch);
    }

    #[test]
    fn test_numeric_tolerates_representation() {
        assert!(numeric(Some(&json!(1.5)), Some(&json!("1.5"))).is_match());
        assert!(numeric(Some(&json!(1)), Some(&json!(1.0))).is_match());
        assert!(!numeric(Some(&json!(1.5)), Some(&json!(2))).is_match());
        assert!(!numeric(Some(&json!(0)), None).is_match());
    }

    #[test]
    fn test_formats_report_output_format_and_missing() {
        let message = formats(&["X".to_owned()], &[]).unwrap_err();
        assert_eq!(
            message,
            "The output format (the first element) is invalid. Expected 'X', actual is 'null'. \
             The following formats are missing: [X]."
        );
    }

    #[test]
    fn test_formats_tail_is_unordered() {
        let expected = vec!["a".to_owned(), "b".to_owned(), "c".to_owned()];
        let actual = vec!["a".to_owned(), "c".to_owned(), "b".to_owned()];
        assert_eq!(formats(&expected, &actual), Ok(AttributeMatch::Match));

        let actual = vec!["a".to_owned(), "d".to_owned()];
        let message = formats(&expected, &actual).unwrap_err();
        assert_eq!(
            message,
            "The following formats are missing: [b, c]. The following formats are unexpected: [d]."
        );
    }

    #[test]
    fn test_values_equal_respects_unordered_keys() {
        let expected = json!({ "type": "ngram", "token_chars": ["letter", "digit"] });
        let actual = json!({ "type": "ngram", "token_chars": ["digit", "letter"] });
        assert!(values_equal(&expected, &actual, &["token_chars"], None));
        assert!(!values_equal(&expected, &actual, &[], None));
    }

    #[test]
    fn test_compare_values_reports_deepest_path() {
        let mut collector = FailureCollector::new();
        compare_values(
            &json!({ "raw": { "type": "keyword", "ignore_above": 256 } }),
            Some(&json!({ "raw": { "type": "keyword", "ignore_above": "128" } })),
            &[],
            None,
            &FailureKind::FieldAttribute("fields".into()),
            &mut collector
                .index("books")
                .with_context(ContextFrame::attribute("fields")),
        );

        let failures = collector.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path(), "fields.raw.ignore_above");
        assert_eq!(
            failures[0].message,
            "Invalid value. Expected '256', actual is '128'."
        );
    }
}
