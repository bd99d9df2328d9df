//! 메트릭 상수 및 설명 등록
//!
//! 수집 세션이 기록하는 모든 Prometheus 메트릭의 이름과 설명을 중앙에서
//! 정의합니다. 카운터 싱크는 이 상수를 사용하여 `metrics::counter!()`를
//! 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `section_http_`
//! - 접미어: `_total` (counter)
//! - hostname별 롤업 카운터: `_by_hostname_total`

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 내부 헬스체크 요청 여부 레이블 키 (`"true"` / `"false"`)
pub const LABEL_HEALTHCHECK: &str = "section_aee_healthcheck";

/// geohash 버킷 레이블 키
pub const LABEL_GEO_HASH: &str = "geo_hash";

/// hostname 레이블 키
pub const LABEL_HOSTNAME: &str = "hostname";

/// content_type 필드가 노출될 때 사용하는 레이블 키
pub const LABEL_CONTENT_TYPE_BUCKET: &str = "content_type_bucket";

// ─── 요청 카운터 ──────────────────────────────────────────────────

/// 레이블 조합별 요청 수 (counter)
pub const REQUEST_COUNT_TOTAL: &str = "section_http_request_count_total";

/// 레이블 조합별 응답 바이트 합계 (counter)
pub const BYTES_TOTAL: &str = "section_http_bytes_total";

/// 페이지 뷰 수 (counter, 레이블 없음)
pub const PAGE_VIEW_TOTAL: &str = "section_http_page_view_total";

/// JSON 디코딩에 실패한 줄 수 (counter, 레이블 없음)
pub const JSON_PARSE_ERRORS_TOTAL: &str = "section_http_json_parse_errors_total";

// ─── hostname 롤업 카운터 ───────────────────────────────────────────

/// hostname별 요청 수 (counter, label: hostname)
pub const REQUEST_COUNT_BY_HOSTNAME_TOTAL: &str = "section_http_request_count_by_hostname_total";

/// hostname별 응답 바이트 합계 (counter, label: hostname)
pub const BYTES_BY_HOSTNAME_TOTAL: &str = "section_http_bytes_by_hostname_total";

/// 레이블 없이 항상 노출되는 스칼라 카운터 목록
pub const SCALAR_COUNTERS: [&str; 2] = [PAGE_VIEW_TOTAL, JSON_PARSE_ERRORS_TOTAL];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// Prometheus HELP 텍스트가 현재 레코더에 설정됩니다. 세션마다 별도
/// 레코더를 쓰므로 `metrics::with_local_recorder` 안에서 호출합니다.
pub fn describe_all() {
    use metrics::describe_counter;

    describe_counter!(
        REQUEST_COUNT_TOTAL,
        "Total number of requests by configured labels"
    );
    describe_counter!(BYTES_TOTAL, "Total response bytes by configured labels");
    describe_counter!(
        PAGE_VIEW_TOTAL,
        "Total number of successful HTML responses served to non-internal user agents"
    );
    describe_counter!(
        JSON_PARSE_ERRORS_TOTAL,
        "Total number of log lines that could not be decoded as JSON objects"
    );
    describe_counter!(
        REQUEST_COUNT_BY_HOSTNAME_TOTAL,
        "Total number of requests by hostname"
    );
    describe_counter!(
        BYTES_BY_HOSTNAME_TOTAL,
        "Total response bytes by hostname"
    );
}
