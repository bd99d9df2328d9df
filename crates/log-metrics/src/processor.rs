//! 라인 처리기 -- 로그 한 줄을 카운터 증가로 바꿉니다.
//!
//! [`MetricsSession`]은 설정된 레이블 목록, hostname 가드, geohash 설정,
//! 카운터 싱크를 한데 묶은 세션 상태입니다. 수집 태스크 하나가 소유하며
//! 세션을 새로 만들면 카운터와 hostname 집합이 모두 초기화됩니다.
//!
//! # 처리 순서
//! ```text
//! JSON 디코딩 ─(실패)─> json_parse_errors_total
//!     │
//!     v
//! 레이블 정제 -> (geohash) -> 바이트 결정 -> hostname 가드
//!     │
//!     v
//! request_count_total / bytes_total / *_by_hostname_total / page_view_total
//! ```

use std::sync::{Arc, LazyLock};

use pipemetrics_core::metrics::{
    BYTES_BY_HOSTNAME_TOTAL, BYTES_TOTAL, JSON_PARSE_ERRORS_TOTAL, LABEL_HEALTHCHECK,
    LABEL_HOSTNAME, PAGE_VIEW_TOTAL, REQUEST_COUNT_BY_HOSTNAME_TOTAL, REQUEST_COUNT_TOTAL,
};
use regex::Regex;
use tracing::{debug, info};

use crate::LabelSet;
use crate::config::SessionConfig;
use crate::error::LogMetricsError;
use crate::geo::{self, Coordinates, GeoPrecision};
use crate::hostname::HostnameGuard;
use crate::record::{FieldValue, LogRecord};
use crate::sanitize::{label_name, label_value};
use crate::sink::CounterSink;

/// 내부 헬스체크 요청의 user agent 경로
pub const USER_AGENT_PATH: &str = "request.http_user_agent";

static INTERNAL_USER_AGENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^aee/v.+").expect("failed creating user agent regex"));

/// 설정된 레이블 하나 (로그 필드 이름, 노출 레이블 이름)
#[derive(Debug, Clone)]
struct LabelField {
    field: String,
    name: String,
}

/// 한 줄을 처리한 결과
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// `request_count_total`에 쓴 레이블
    pub labels: LabelSet,
    /// `bytes_total`에 쓴 레이블
    pub byte_labels: LabelSet,
    /// 가드를 통과한 hostname (hostname 레이블이 설정된 경우)
    pub hostname: Option<String>,
    /// 기록한 바이트 수
    pub bytes: u64,
    /// 페이지 뷰로 집계했는지 여부
    pub page_view: bool,
    /// geohash 추출 결과 (geohash 사용 시)
    pub coordinates: Option<Coordinates>,
}

/// 메트릭 세션
pub struct MetricsSession {
    labels: Vec<LabelField>,
    hostname_configured: bool,
    hostname_rollup: bool,
    geo_precision: Option<GeoPrecision>,
    guard: HostnameGuard,
    sink: Arc<dyn CounterSink>,
}

impl MetricsSession {
    /// 설정을 검증하고 세션을 만듭니다.
    ///
    /// 레이블 이름 변환(`content_type` → `content_type_bucket`)은 여기서
    /// 한 번만 수행됩니다.
    pub fn new(config: &SessionConfig, sink: Arc<dyn CounterSink>) -> Result<Self, LogMetricsError> {
        config.validate()?;

        let labels: Vec<LabelField> = config
            .labels
            .iter()
            .map(|field| LabelField {
                field: field.clone(),
                name: label_name(field).to_owned(),
            })
            .collect();
        let hostname_configured = labels.iter().any(|l| l.name == LABEL_HOSTNAME);
        let geo_precision = config
            .geo_hash
            .then(|| GeoPrecision::new(config.geo_hash_precision));

        info!(
            labels = ?config.labels,
            max_hostnames = config.max_hostnames,
            hostname_rollup = config.hostname_rollup && hostname_configured,
            geo_hash_precision = geo_precision.map(GeoPrecision::get),
            "metrics session initialised"
        );

        Ok(Self {
            labels,
            hostname_configured,
            hostname_rollup: config.hostname_rollup,
            geo_precision,
            guard: HostnameGuard::new(config.max_hostnames),
            sink,
        })
    }

    /// 로그 한 줄을 처리합니다.
    ///
    /// JSON 객체로 디코딩할 수 없으면 `json_parse_errors_total`만 증가시키고
    /// 에러를 반환합니다.
    pub fn process_line(&mut self, line: &[u8]) -> Result<RecordedRequest, LogMetricsError> {
        match LogRecord::from_slice(line) {
            Ok(record) => Ok(self.process_record(&record)),
            Err(e) => {
                debug!(error = %e, "failed to decode log line");
                self.sink
                    .increment(JSON_PARSE_ERRORS_TOTAL, &LabelSet::new(), 1);
                Err(e)
            }
        }
    }

    /// 디코딩된 레코드 하나를 집계합니다.
    pub fn process_record(&mut self, record: &LogRecord) -> RecordedRequest {
        let user_agent = record.get_path(USER_AGENT_PATH).as_str().unwrap_or_default();
        let internal = INTERNAL_USER_AGENT.is_match(user_agent);

        let mut labels = LabelSet::new();
        for label in &self.labels {
            labels.insert(label.name.clone(), label_value(&label.field, record.get(&label.field)));
        }
        labels.insert(LABEL_HEALTHCHECK.to_owned(), internal.to_string());

        let mut coordinates = None;
        if let Some(precision) = self.geo_precision {
            let (hashed, coords) = geo::to_hash(&labels, record, precision);
            labels = hashed;
            coordinates = Some(coords);
        }

        let bytes = resolve_bytes(record);

        let hostname = if self.hostname_configured {
            let sanitized = labels.remove(LABEL_HOSTNAME).unwrap_or_default();
            let admitted = self.guard.admit(&sanitized);
            if !self.hostname_rollup {
                labels.insert(LABEL_HOSTNAME.to_owned(), admitted.clone());
            }
            Some(admitted)
        } else {
            None
        };

        self.sink.increment(REQUEST_COUNT_TOTAL, &labels, 1);

        let mut byte_labels = geo::scrub(&labels);
        byte_labels.remove(LABEL_HEALTHCHECK);
        self.sink.increment(BYTES_TOTAL, &byte_labels, bytes);

        if let (Some(host), true) = (&hostname, self.hostname_rollup) {
            let host_labels = LabelSet::from([(LABEL_HOSTNAME.to_owned(), host.clone())]);
            self.sink
                .increment(REQUEST_COUNT_BY_HOSTNAME_TOTAL, &host_labels, 1);
            self.sink
                .increment(BYTES_BY_HOSTNAME_TOTAL, &host_labels, bytes);
        }

        let page_view = is_page_view(record, internal);
        if page_view {
            self.sink.increment(PAGE_VIEW_TOTAL, &LabelSet::new(), 1);
        }

        RecordedRequest {
            labels,
            byte_labels,
            hostname,
            bytes,
            page_view,
            coordinates,
        }
    }

    /// 지금까지 허용된 hostname 수
    pub fn hostnames_admitted(&self) -> usize {
        self.guard.admitted()
    }
}

impl std::fmt::Debug for MetricsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsSession")
            .field("labels", &self.labels)
            .field("hostname_rollup", &self.hostname_rollup)
            .field("geo_precision", &self.geo_precision)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

/// 응답 바이트 수를 결정합니다.
///
/// `bytes`가 양의 정수이면 그 값, 아니면 `bytes_sent`를 쓰며 음수는 0으로,
/// 둘 다 해석할 수 없으면 0입니다.
pub fn resolve_bytes(record: &LogRecord) -> u64 {
    if let Some(bytes) = record.get("bytes").to_integer().filter(|b| *b > 0) {
        return bytes.unsigned_abs();
    }
    record
        .get("bytes_sent")
        .to_integer()
        .map(|b| b.max(0).unsigned_abs())
        .unwrap_or(0)
}

/// 2xx HTML 응답이고 내부 user agent가 아니면 페이지 뷰입니다.
fn is_page_view(record: &LogRecord, internal_user_agent: bool) -> bool {
    let status = record.get("status").to_label_string();
    let content_type = match record.get("content_type") {
        FieldValue::Missing => String::new(),
        other => other.to_label_string().to_lowercase(),
    };
    status.starts_with('2') && content_type.starts_with("text/html") && !internal_user_agent
}
