//! Proptest strategies for generating record sets and run sizes

use fieldgen_core::models::Record;
use proptest::prelude::*;
use serde_json::Value;

/// Record counts around and across batch boundaries
pub fn record_count_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![
        Just(0usize),
        1usize..=25,
        Just(25usize),
        Just(26usize),
        26usize..=130,
    ]
}

/// Field values a source field may hold
pub fn field_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        "[a-zA-Z0-9 ?]{0,24}".prop_map(Value::String),
        any::<i32>().prop_map(Value::from),
        any::<bool>().prop_map(Value::Bool),
    ]
}

/// Records `rec0..` with arbitrary source values
pub fn records_strategy(max: usize) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(field_value_strategy(), 0..=max).prop_map(|values| {
        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| Record::new(format!("rec{i}")).with_field("Prompt", value))
            .collect()
    })
}
