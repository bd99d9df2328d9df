//! 레이블 값 정제
//!
//! 로그 필드 값을 Prometheus 레이블로 쓸 수 있는 유한한 값 집합으로
//! 정규화합니다. 규칙을 통과하지 못한 값은 빈 문자열이 됩니다.
//!
//! | 레이블 | 규칙 |
//! |---|---|
//! | `content_type` | `image`, `html`, `css`, `javascript`, `other` 중 하나 |
//! | `hostname` | 포트 제거, 소문자, `^[a-z0-9.-]+$` |
//! | `status` | 알려진 HTTP 상태 코드 범위 |
//! | 그 외 | 공백 제거 후 그대로 |
//!
//! 모든 값은 규칙 적용 후 [`MAX_LABEL_VALUE_CHARS`]자로 잘립니다.

use std::sync::LazyLock;

use pipemetrics_core::metrics::LABEL_CONTENT_TYPE_BUCKET;
use regex::Regex;

use crate::record::FieldValue;

/// 레이블 값 최대 길이 (문자 수)
pub const MAX_LABEL_VALUE_CHARS: usize = 80;

static VALID_HOSTNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9.-]+$").expect("failed creating hostname regex"));

/// 로그 필드 이름을 노출용 레이블 이름으로 바꿉니다.
pub fn label_name(label: &str) -> &str {
    match label {
        "content_type" => LABEL_CONTENT_TYPE_BUCKET,
        other => other,
    }
}

/// 필드 값을 레이블 값으로 정제합니다.
pub fn label_value(label: &str, value: &FieldValue) -> String {
    let raw = match value {
        FieldValue::Missing => return String::new(),
        FieldValue::String(s) if s.is_empty() || s == "-" => return String::new(),
        other => other.to_label_string(),
    };
    let trimmed = raw.trim();

    let sanitized = match label {
        "content_type" => content_type_bucket(trimmed).to_owned(),
        "hostname" => hostname(trimmed),
        "status" => status(trimmed),
        _ => trimmed.to_owned(),
    };

    truncate(sanitized)
}

/// (레이블 이름, 정제된 값) 쌍을 반환합니다.
pub fn sanitize<'a>(label: &'a str, value: &FieldValue) -> (&'a str, String) {
    (label_name(label), label_value(label, value))
}

fn content_type_bucket(value: &str) -> &'static str {
    if value.is_empty() {
        return "";
    }
    let lower = value.to_lowercase();
    if lower.starts_with("image/") {
        "image"
    } else if lower.starts_with("text/html") {
        "html"
    } else if lower.starts_with("text/css") {
        "css"
    } else if lower.contains("javascript") {
        "javascript"
    } else {
        "other"
    }
}

fn hostname(value: &str) -> String {
    let host = value.split(':').next().unwrap_or_default().to_lowercase();
    if VALID_HOSTNAME.is_match(&host) {
        host
    } else {
        String::new()
    }
}

fn status(value: &str) -> String {
    match value.parse::<u16>() {
        Ok(code) if is_known_status(code) => value.to_owned(),
        _ => String::new(),
    }
}

fn is_known_status(code: u16) -> bool {
    matches!(code, 100..=103 | 200..=208 | 300..=308 | 400..=431 | 499 | 500..=511)
}

fn truncate(mut value: String) -> String {
    if let Some((idx, _)) = value.char_indices().nth(MAX_LABEL_VALUE_CHARS) {
        value.truncate(idx);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn s(v: &str) -> FieldValue {
        FieldValue::String(v.to_owned())
    }

    #[test]
    fn absent_values_are_empty_for_every_label() {
        for label in ["status", "hostname", "content_type", "region"] {
            assert_eq!(label_value(label, &FieldValue::Missing), "");
            assert_eq!(label_value(label, &s("")), "");
            assert_eq!(label_value(label, &s("-")), "");
        }
    }

    #[test]
    fn dash_is_checked_before_trimming() {
        // 공백이 섞인 "-"는 통과 레이블에서 그대로 남음
        assert_eq!(label_value("region", &s(" - ")), "-");
    }

    #[test]
    fn status_codes() {
        assert_eq!(label_value("status", &s("200")), "200");
        assert_eq!(label_value("status", &FieldValue::Integer(404)), "404");
        assert_eq!(label_value("status", &FieldValue::Integer(499)), "499");
        assert_eq!(label_value("status", &s(" 503 ")), "503");
        assert_eq!(label_value("status", &s("220")), "");
        assert_eq!(label_value("status", &s("432")), "");
        assert_eq!(label_value("status", &s("foobar")), "");
        assert_eq!(label_value("status", &FieldValue::Integer(-1)), "");
        assert_eq!(label_value("status", &FieldValue::Float(200.0)), "200");
        // 허용 범위면 입력 문자열을 그대로 유지
        assert_eq!(label_value("status", &s("0200")), "0200");
        assert_eq!(label_value("status", &s("+200")), "+200");
    }

    #[test]
    fn hostnames() {
        assert_eq!(label_value("hostname", &s("WWw.FOo.COm:80")), "www.foo.com");
        assert_eq!(label_value("hostname", &s("www.fi$h.com")), "");
        assert_eq!(label_value("hostname", &s("  api.example.net ")), "api.example.net");
        assert_eq!(label_value("hostname", &s(":8080")), "");
    }

    #[test]
    fn sanitized_hostname_is_stable() {
        let once = label_value("hostname", &s("www.foo.com"));
        assert_eq!(label_value("hostname", &s(&once)), "www.foo.com");
    }

    #[test]
    fn content_type_buckets() {
        let cases = [
            ("image/png", "image"),
            ("IMAGE/JPEG", "image"),
            ("text/html; charset=utf-8", "html"),
            ("text/css", "css"),
            ("application/javascript", "javascript"),
            ("text/x-javascript", "javascript"),
            ("application/json", "other"),
            ("-", ""),
            ("   ", ""),
        ];
        for (raw, expected) in cases {
            assert_eq!(label_value("content_type", &s(raw)), expected, "input {raw:?}");
        }
    }

    #[test]
    fn content_type_is_renamed() {
        assert_eq!(label_name("content_type"), "content_type_bucket");
        assert_eq!(label_name("hostname"), "hostname");
        let (name, value) = sanitize("content_type", &s("text/css"));
        assert_eq!((name, value.as_str()), ("content_type_bucket", "css"));
    }

    #[test]
    fn passthrough_labels_are_trimmed_and_coerced() {
        assert_eq!(label_value("region", &s("  eu-west ")), "eu-west");
        assert_eq!(label_value("cache", &FieldValue::Bool(false)), "false");
        assert_eq!(label_value("upstream", &FieldValue::Float(3.0)), "3");
    }

    #[test]
    fn long_values_are_truncated_by_chars() {
        let long = "é".repeat(100);
        let out = label_value("region", &s(&long));
        assert_eq!(out.chars().count(), MAX_LABEL_VALUE_CHARS);
    }

    proptest! {
        #[test]
        fn sanitized_values_never_exceed_max_len(label in "[a-z_]{1,12}", raw in ".{0,200}") {
            let out = label_value(&label, &FieldValue::String(raw));
            prop_assert!(out.chars().count() <= MAX_LABEL_VALUE_CHARS);
        }

        #[test]
        fn sanitizing_is_idempotent(
            label in prop::sample::select(vec!["status", "hostname"]),
            raw in "[ -~]{0,120}",
        ) {
            let once = label_value(label, &FieldValue::String(raw));
            let twice = label_value(label, &FieldValue::String(once.clone()));
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn hostname_output_is_empty_or_valid(raw in ".{0,100}") {
            let out = label_value("hostname", &FieldValue::String(raw));
            prop_assert!(out.is_empty() || VALID_HOSTNAME.is_match(&out));
        }
    }
}
