//! pipemetrics 공통 크레이트
//!
//! 모든 pipemetrics 크레이트가 공유하는 설정, 에러 타입, 메트릭 이름 상수,
//! 모듈 생명주기 trait을 정의합니다.
//!
//! # 모듈 구성
//!
//! - [`config`]: `pipemetrics.toml` 파싱, 환경변수 오버라이드, 유효성 검증
//! - [`error`]: 최상위 에러 타입
//! - [`metrics`]: Prometheus 메트릭 이름/레이블 상수 및 설명 등록
//! - [`pipeline`]: start/stop/health_check 생명주기 trait

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, PipelineError, PipemetricsError};

// 설정
pub use config::PipemetricsConfig;

// 파이프라인 trait
pub use pipeline::{HealthStatus, Pipeline};
