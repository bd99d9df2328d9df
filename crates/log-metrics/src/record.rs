//! 로그 레코드 모델
//!
//! 한 줄의 JSON 객체를 디코딩한 결과를 [`LogRecord`]로 표현합니다.
//! 각 값은 [`FieldValue`] 태그드 변형으로 보관되며, 레이블 문자열로의
//! 변환 규칙은 [`FieldValue::to_label_string`] 한 곳에 모여 있습니다.

use std::collections::BTreeMap;

use crate::error::LogMetricsError;

/// 로그 필드 값
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// 키가 없거나 JSON `null`
    #[default]
    Missing,
    /// 문자열
    String(String),
    /// 정수
    Integer(i64),
    /// 부동소수점 (i64 범위를 넘는 정수 포함)
    Float(f64),
    /// 불리언
    Bool(bool),
    /// 배열
    List(Vec<FieldValue>),
    /// 중첩 객체
    Object(LogRecord),
}

impl FieldValue {
    /// 값이 없는지 확인합니다.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// 문자열 값이면 참조를 반환합니다.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// 객체 값이면 참조를 반환합니다.
    pub fn as_object(&self) -> Option<&LogRecord> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// 레이블 값으로 쓸 표시 문자열로 변환합니다.
    ///
    /// - 정수: 10진수
    /// - 소수부가 없는 부동소수점: 소수점 없이 (`5.0` → `"5"`)
    /// - 불리언: `true` / `false`
    /// - 배열/객체: 압축 JSON
    /// - 값 없음: 빈 문자열
    pub fn to_label_string(&self) -> String {
        match self {
            Self::Missing => String::new(),
            Self::String(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => format_float(*f),
            Self::Bool(b) => b.to_string(),
            Self::List(_) | Self::Object(_) => self.to_json().to_string(),
        }
    }

    /// 정수로 해석합니다. 문자열은 공백을 제거한 뒤 파싱합니다.
    ///
    /// 소수부가 있는 값이나 해석할 수 없는 값은 `None`입니다.
    pub fn to_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                let min = i64::MIN as f64;
                let max = i64::MAX as f64;
                (min..max).contains(f).then_some(*f as i64)
            }
            Self::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::Missing => Value::Null,
            Self::String(s) => Value::String(s.clone()),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Bool(b) => Value::Bool(*b),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(obj) => Value::Object(
                obj.fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{f:.0}")
    } else {
        f.to_string()
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Missing,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Missing),
            },
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Object(LogRecord::from_map(map)),
        }
    }
}

/// 디코딩된 로그 한 줄
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogRecord {
    fields: BTreeMap<String, FieldValue>,
}

static MISSING: FieldValue = FieldValue::Missing;

impl LogRecord {
    /// JSON 바이트를 디코딩합니다. 최상위는 객체여야 합니다.
    pub fn from_slice(raw: &[u8]) -> Result<Self, LogMetricsError> {
        match serde_json::from_slice::<serde_json::Value>(raw)? {
            serde_json::Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(LogMetricsError::Parse {
                column: 0,
                reason: format!("expected JSON object at top level, got {}", json_kind(&other)),
            }),
        }
    }

    fn from_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            fields: map
                .into_iter()
                .map(|(k, v)| (k, FieldValue::from(v)))
                .collect(),
        }
    }

    /// 최상위 필드를 조회합니다. 없으면 [`FieldValue::Missing`]입니다.
    pub fn get(&self, key: &str) -> &FieldValue {
        self.fields.get(key).unwrap_or(&MISSING)
    }

    /// 점 표기 경로(`request.http_user_agent`)로 필드를 조회합니다.
    pub fn get_path(&self, path: &str) -> &FieldValue {
        let mut parts = path.split('.');
        let Some(first) = parts.next() else {
            return &MISSING;
        };
        let mut current = self.get(first);
        for part in parts {
            current = match current.as_object() {
                Some(obj) => obj.get(part),
                None => return &MISSING,
            };
        }
        current
    }

    /// 필드를 설정합니다.
    pub fn insert(&mut self, key: impl Into<String>, value: FieldValue) {
        self.fields.insert(key.into(), value);
    }

    /// 필드 수
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// 필드가 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
