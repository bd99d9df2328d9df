//! # pipemetrics-log-metrics
//!
//! 웹 서버 접근 로그(줄 단위 JSON)를 FIFO에서 읽어 그대로 흘려보내면서
//! Prometheus 카운터로 집계합니다.
//!
//! # 모듈 구성
//!
//! - [`record`]: 동적 JSON 레코드와 값 강제 변환
//! - [`sanitize`]: 레이블 값 정제 (status, hostname, content_type, 길이 제한)
//! - [`geo`]: 좌표 추출과 geohash 버킷
//! - [`hostname`]: hostname 카디널리티 제한
//! - [`sink`]: 카운터 싱크 (세션 전용 Prometheus 레코더)
//! - [`processor`]: 줄 처리기 ([`MetricsSession`])
//! - [`collector`]: FIFO 수집 루프
//! - [`pipeline`]: 생명주기 관리 (Pipeline trait 구현)
//! - [`config`]: 세션/파이프라인 설정 (core 설정에서 파생)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! FIFO -> FifoCollector -> passthrough
//!              |
//!        MetricsSession (sanitize -> geo -> hostname guard)
//!              |
//!        PrometheusSink -> /metrics
//! ```

pub mod collector;
pub mod config;
pub mod error;
pub mod geo;
pub mod hostname;
pub mod pipeline;
pub mod processor;
pub mod record;
pub mod sanitize;
pub mod sink;

/// 레이블 이름 → 값. 순서가 정해져 있어 렌더링 결과가 안정적입니다.
pub type LabelSet = std::collections::BTreeMap<String, String>;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{MetricsPipeline, MetricsPipelineBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder, SessionConfig};

// 에러
pub use error::{GeoError, LogMetricsError};

// 처리기
pub use processor::{MetricsSession, RecordedRequest};

// 수집기
pub use collector::{CollectorStatus, CollectorSummary, FifoCollector};

// 싱크
pub use sink::{CounterSink, PrometheusSink};

// 레코드
pub use record::{FieldValue, LogRecord};
