//! Test data builders for records and run configuration

use fieldgen_core::config::RunConfiguration;
use fieldgen_core::models::Record;

pub const SOURCE_FIELD: &str = "Prompt";
pub const TARGET_FIELD: &str = "Answer";

/// `rec1..=recN` with prompts `prompt 1..=N`
pub fn numbered_records(count: usize) -> Vec<Record> {
    (1..=count)
        .map(|n| Record::new(format!("rec{n}")).with_field(SOURCE_FIELD, format!("prompt {n}")))
        .collect()
}

/// Complete configuration mapping [`SOURCE_FIELD`] to [`TARGET_FIELD`]
pub fn run_config() -> RunConfiguration {
    RunConfiguration::builder()
        .api_key("sk-test-0123456789")
        .model("text-davinci-003")
        .max_tokens(256)
        .temperature(0.3)
        .fields(SOURCE_FIELD, TARGET_FIELD)
        .build()
}
