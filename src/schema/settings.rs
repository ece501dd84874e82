use serde_json::Value;

use super::compare;
use crate::failure::{ContextFrame, ContextualFailureCollector, FailureKind};
use crate::models::IndexSettings;

/// Compares the settings the desired schema declares. Settings the store
/// holds beyond those (uuid, creation date, settings from other tools) are
/// ignored. Analysis is compared separately, by reference.
pub fn compare_settings(
    desired: &IndexSettings,
    observed: &IndexSettings,
    collector: &mut ContextualFailureCollector<'_>,
) {
    compare_declared(
        collector,
        "number_of_shards",
        desired.number_of_shards.map(Value::from),
        observed.number_of_shards.map(Value::from),
    );
    compare_declared(
        collector,
        "number_of_replicas",
        desired.number_of_replicas.map(Value::from),
        observed.number_of_replicas.map(Value::from),
    );
    compare_declared(
        collector,
        "max_result_window",
        desired.max_result_window.map(Value::from),
        observed.max_result_window.map(Value::from),
    );

    let observed_custom = observed.custom_flat();
    for (key, expected) in desired.custom_flat() {
        compare_declared(collector, &key, Some(expected), observed_custom.get(&key).cloned());
    }
}

fn compare_declared(
    collector: &mut ContextualFailureCollector<'_>,
    key: &str,
    expected: Option<Value>,
    actual: Option<Value>,
) {
    let Some(expected) = expected else {
        return;
    };
    let matches = actual
        .as_ref()
        .is_some_and(|actual| compare::values_equal(&expected, actual, &[], None));
    if !matches {
        collector
            .with_context(ContextFrame::setting(key))
            .add(
                FailureKind::Setting(key.to_owned()),
                compare::invalid_value(compare::render(&expected), compare::render_option(actual.as_ref())),
            );
    }
}
