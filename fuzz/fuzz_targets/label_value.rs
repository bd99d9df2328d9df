#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pipemetrics_log_metrics::FieldValue;
use pipemetrics_log_metrics::sanitize::{MAX_LABEL_VALUE_CHARS, label_value};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    label: FuzzLabel,
    value: String,
}

#[derive(Arbitrary, Debug)]
enum FuzzLabel {
    Status,
    Hostname,
    ContentType,
    Other,
}

fuzz_target!(|input: FuzzInput| {
    let label = match input.label {
        FuzzLabel::Status => "status",
        FuzzLabel::Hostname => "hostname",
        FuzzLabel::ContentType => "content_type",
        FuzzLabel::Other => "region",
    };
    let out = label_value(label, &FieldValue::String(input.value));
    assert!(out.chars().count() <= MAX_LABEL_VALUE_CHARS);
});
