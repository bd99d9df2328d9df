//! 수집 세션 설정
//!
//! [`PipelineConfig`]는 core의 [`PipemetricsConfig`]에서 FIFO와 세션 섹션을
//! 가져와 수집 파이프라인이 쓰는 형태로 묶습니다.
//!
//! # 사용 예시
//! ```
//! use pipemetrics_core::config::PipemetricsConfig;
//! use pipemetrics_log_metrics::config::PipelineConfig;
//!
//! let core_config = PipemetricsConfig::default();
//! let config = PipelineConfig::from_core(&core_config);
//! assert_eq!(config.session.max_hostnames, 1000);
//! ```

use std::collections::HashSet;
use std::path::PathBuf;

use pipemetrics_core::config::PipemetricsConfig;
use pipemetrics_core::metrics::{LABEL_GEO_HASH, LABEL_HEALTHCHECK};

use crate::error::LogMetricsError;
use crate::sanitize::label_name;

/// 메트릭 세션 설정
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// 레이블로 쓸 로그 필드 (순서 유지)
    pub labels: Vec<String>,
    /// hostname 레이블 값 상한
    pub max_hostnames: usize,
    /// hostname을 별도 카운터로 분리할지 여부
    pub hostname_rollup: bool,
    /// geohash 레이블 사용 여부
    pub geo_hash: bool,
    /// geohash 길이 요청값
    pub geo_hash_precision: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_core(&pipemetrics_core::config::SessionConfig::default())
    }
}

impl SessionConfig {
    /// core 세션 설정에서 생성합니다.
    pub fn from_core(core: &pipemetrics_core::config::SessionConfig) -> Self {
        Self {
            labels: core.labels.clone(),
            max_hostnames: core.max_hostnames,
            hostname_rollup: core.hostname_rollup,
            geo_hash: core.geo_hash,
            geo_hash_precision: core.geo_hash_precision,
        }
    }

    /// 레이블 목록과 상한을 검증합니다.
    ///
    /// 노출 이름 기준으로 중복을 거부하고, 내부 레이블 이름
    /// (`section_aee_healthcheck`, `geo_hash`)과의 충돌을 거부합니다.
    pub fn validate(&self) -> Result<(), LogMetricsError> {
        if self.max_hostnames == 0 {
            return Err(LogMetricsError::Config {
                field: "max_hostnames".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        let mut exposed = HashSet::new();
        for label in &self.labels {
            if label.trim().is_empty() {
                return Err(LogMetricsError::Config {
                    field: "labels".to_owned(),
                    reason: "label names must not be empty".to_owned(),
                });
            }
            let name = label_name(label);
            if name == LABEL_HEALTHCHECK || name == LABEL_GEO_HASH {
                return Err(LogMetricsError::Config {
                    field: "labels".to_owned(),
                    reason: format!("'{label}' is reserved for internal use"),
                });
            }
            if !exposed.insert(name) {
                return Err(LogMetricsError::Config {
                    field: "labels".to_owned(),
                    reason: format!("duplicate label '{name}'"),
                });
            }
        }

        Ok(())
    }
}

/// 수집 파이프라인 설정
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// 입력 FIFO 경로
    pub fifo_path: PathBuf,
    /// 시작 시 FIFO 재생성 여부
    pub create_fifo: bool,
    /// 쓰기 핸들 유지 여부
    pub keepalive_writer: bool,
    /// 세션 설정
    pub session: SessionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&PipemetricsConfig::default())
    }
}

impl PipelineConfig {
    /// core 통합 설정에서 생성합니다.
    pub fn from_core(core: &PipemetricsConfig) -> Self {
        Self {
            fifo_path: PathBuf::from(&core.fifo.path),
            create_fifo: core.fifo.create,
            keepalive_writer: core.fifo.keepalive_writer,
            session: SessionConfig::from_core(&core.session),
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogMetricsError> {
        if self.fifo_path.as_os_str().is_empty() {
            return Err(LogMetricsError::Config {
                field: "fifo_path".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        self.session.validate()
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// FIFO 경로를 설정합니다.
    pub fn fifo_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.fifo_path = path.into();
        self
    }

    /// FIFO 재생성 여부를 설정합니다.
    pub fn create_fifo(mut self, create: bool) -> Self {
        self.config.create_fifo = create;
        self
    }

    /// 쓰기 핸들 유지 여부를 설정합니다.
    pub fn keepalive_writer(mut self, keepalive: bool) -> Self {
        self.config.keepalive_writer = keepalive;
        self
    }

    /// 레이블 필드를 설정합니다.
    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.session.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// hostname 상한을 설정합니다.
    pub fn max_hostnames(mut self, max: usize) -> Self {
        self.config.session.max_hostnames = max;
        self
    }

    /// hostname 롤업 여부를 설정합니다.
    pub fn hostname_rollup(mut self, rollup: bool) -> Self {
        self.config.session.hostname_rollup = rollup;
        self
    }

    /// geohash 레이블을 켜고 길이를 지정합니다.
    pub fn geo_hash(mut self, precision: usize) -> Self {
        self.config.session.geo_hash = true;
        self.config.session.geo_hash_precision = precision;
        self
    }

    /// 설정을 검증하고 반환합니다.
    pub fn build(self) -> Result<PipelineConfig, LogMetricsError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
