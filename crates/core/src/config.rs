//! 설정 관리 — pipemetrics.toml 파싱 및 런타임 설정
//!
//! [`PipemetricsConfig`]는 데몬과 수집 세션이 사용하는 모든 설정을 담는
//! 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`PIPEMETRICS_METRICS_PORT=9100` 형식)
//! 3. 설정 파일 (`pipemetrics.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), pipemetrics_core::error::PipemetricsError> {
//! use pipemetrics_core::config::PipemetricsConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = PipemetricsConfig::load("pipemetrics.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = PipemetricsConfig::parse("[session]\nmax_hostnames = 50")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, PipemetricsError};

/// pipemetrics 통합 설정
///
/// `pipemetrics.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipemetricsConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 입력 FIFO 설정
    #[serde(default)]
    pub fifo: FifoConfig,
    /// 메트릭 세션(레이블, 카디널리티, geohash) 설정
    #[serde(default)]
    pub session: SessionConfig,
    /// 메트릭 노출 서버 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl PipemetricsConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PipemetricsError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, PipemetricsError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipemetricsError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                PipemetricsError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, PipemetricsError> {
        toml::from_str(toml_str).map_err(|e| {
            PipemetricsError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `PIPEMETRICS_{SECTION}_{FIELD}`
    /// 예: `PIPEMETRICS_SESSION_MAX_HOSTNAMES=500`
    ///
    /// 이전 배포의 `MODULE_METRICS_MAX_HOSTNAMES`, `P8S_METRICS_PORT`,
    /// `P8S_METRICS_PATH`도 읽으며, 같은 값에 `PIPEMETRICS_*`가 있으면 그쪽이 이깁니다.
    pub fn apply_env_overrides(&mut self) {
        // Legacy
        override_usize(
            &mut self.session.max_hostnames,
            "MODULE_METRICS_MAX_HOSTNAMES",
        );
        override_u16(&mut self.metrics.port, "P8S_METRICS_PORT");
        override_nonempty(&mut self.metrics.endpoint, "P8S_METRICS_PATH");

        // General
        override_string(
            &mut self.general.log_level,
            "PIPEMETRICS_GENERAL_LOG_LEVEL",
        );
        override_string(
            &mut self.general.log_format,
            "PIPEMETRICS_GENERAL_LOG_FORMAT",
        );

        // FIFO
        override_string(&mut self.fifo.path, "PIPEMETRICS_FIFO_PATH");
        override_bool(&mut self.fifo.create, "PIPEMETRICS_FIFO_CREATE");
        override_bool(
            &mut self.fifo.keepalive_writer,
            "PIPEMETRICS_FIFO_KEEPALIVE_WRITER",
        );

        // Session
        override_csv(&mut self.session.labels, "PIPEMETRICS_SESSION_LABELS");
        override_usize(
            &mut self.session.max_hostnames,
            "PIPEMETRICS_SESSION_MAX_HOSTNAMES",
        );
        override_bool(
            &mut self.session.hostname_rollup,
            "PIPEMETRICS_SESSION_HOSTNAME_ROLLUP",
        );
        override_bool(&mut self.session.geo_hash, "PIPEMETRICS_SESSION_GEO_HASH");
        override_usize(
            &mut self.session.geo_hash_precision,
            "PIPEMETRICS_SESSION_GEO_HASH_PRECISION",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "PIPEMETRICS_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "PIPEMETRICS_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "PIPEMETRICS_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "PIPEMETRICS_METRICS_ENDPOINT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), PipemetricsError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.fifo.path.trim().is_empty() {
            return Err(invalid("fifo.path", "must not be empty"));
        }

        if self.session.max_hostnames == 0 {
            return Err(invalid("session.max_hostnames", "must be greater than 0"));
        }

        if self.session.labels.iter().any(|l| l.trim().is_empty()) {
            return Err(invalid("session.labels", "label names must not be empty"));
        }

        // 노출 서버가 꺼져 있으면 주소/포트 검증을 건너뜀
        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(invalid("metrics.port", "must be greater than 0"));
            }
            if !self.metrics.endpoint.starts_with('/') {
                return Err(invalid("metrics.endpoint", "must start with '/'"));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> PipemetricsError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 입력 FIFO 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FifoConfig {
    /// FIFO 경로
    pub path: String,
    /// 시작 시 기존 파일을 지우고 FIFO를 새로 생성할지 여부
    pub create: bool,
    /// 데몬이 쓰기 핸들을 열어 두어 writer 교체 사이에 EOF가 나지 않게 할지 여부
    pub keepalive_writer: bool,
}

impl Default for FifoConfig {
    fn default() -> Self {
        Self {
            path: "/var/log/pipemetrics/access.log".to_owned(),
            create: true,
            keepalive_writer: false,
        }
    }
}

/// 메트릭 세션 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 레이블로 사용할 로그 필드 이름 (순서 유지)
    pub labels: Vec<String>,
    /// 서로 다른 hostname 레이블 값의 최대 개수
    pub max_hostnames: usize,
    /// hostname을 별도 카운터로 분리하고 일반 레이블에서 제외할지 여부
    pub hostname_rollup: bool,
    /// geohash 레이블 활성화 여부
    pub geo_hash: bool,
    /// geohash 길이 (1..=12, 범위 밖이면 2로 대체)
    pub geo_hash_precision: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            labels: vec![
                "status".to_owned(),
                "content_type".to_owned(),
                "hostname".to_owned(),
            ],
            max_hostnames: 1000,
            hostname_rollup: true,
            geo_hash: false,
            geo_hash_precision: 2,
        }
    }
}

/// 메트릭 노출 서버 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 노출 서버 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "0.0.0.0".to_owned(),
            port: 9000,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_nonempty(target: &mut String, env_key: &str) {
    match std::env::var(env_key) {
        Ok(val) if !val.is_empty() => *target = val,
        _ => {}
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.trim().parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = PipemetricsConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.fifo.path, "/var/log/pipemetrics/access.log");
        assert!(config.fifo.create);
        assert!(!config.fifo.keepalive_writer);
        assert_eq!(
            config.session.labels,
            vec!["status", "content_type", "hostname"]
        );
        assert_eq!(config.session.max_hostnames, 1000);
        assert!(config.session.hostname_rollup);
        assert!(!config.session.geo_hash);
        assert_eq!(config.metrics.port, 9000);
        assert_eq!(config.metrics.endpoint, "/metrics");
    }

    #[test]
    fn default_config_passes_validation() {
        PipemetricsConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = PipemetricsConfig::parse("").unwrap();
        assert_eq!(config.session.max_hostnames, 1000);
        assert_eq!(config.metrics.listen_addr, "0.0.0.0");
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[session]
labels = ["status", "region"]
geo_hash = true
geo_hash_precision = 5

[metrics]
port = 9100
"#;
        let config = PipemetricsConfig::parse(toml).unwrap();
        assert_eq!(config.session.labels, vec!["status", "region"]);
        assert!(config.session.geo_hash);
        assert_eq!(config.session.geo_hash_precision, 5);
        // 나머지는 기본값 유지
        assert_eq!(config.session.max_hostnames, 1000);
        assert_eq!(config.metrics.port, 9100);
        assert_eq!(config.metrics.endpoint, "/metrics");
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = PipemetricsConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            PipemetricsError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = PipemetricsConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = PipemetricsConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_empty_fifo_path() {
        let mut config = PipemetricsConfig::default();
        config.fifo.path = "  ".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("fifo.path"));
    }

    #[test]
    fn validate_rejects_zero_max_hostnames() {
        let mut config = PipemetricsConfig::default();
        config.session.max_hostnames = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_hostnames"));
    }

    #[test]
    fn validate_rejects_empty_label_name() {
        let mut config = PipemetricsConfig::default();
        config.session.labels.push(String::new());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("session.labels"));
    }

    #[test]
    fn validate_rejects_zero_port() {
        let mut config = PipemetricsConfig::default();
        config.metrics.port = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("metrics.port"));
    }

    #[test]
    fn validate_rejects_relative_endpoint() {
        let mut config = PipemetricsConfig::default();
        config.metrics.endpoint = "metrics".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("metrics.endpoint"));
    }

    #[test]
    fn validate_skips_server_checks_when_disabled() {
        let mut config = PipemetricsConfig::default();
        config.metrics.enabled = false;
        config.metrics.port = 0;
        config.validate().unwrap();
    }

    #[test]
    fn validate_accepts_out_of_range_precision() {
        let mut config = PipemetricsConfig::default();
        config.session.geo_hash_precision = 40;
        config.validate().unwrap();
    }

    #[test]
    #[serial]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: serial 테스트로 실행되므로 환경변수 조작이 다른 테스트와 겹치지 않습니다.
        unsafe { std::env::set_var("TEST_PIPEMETRICS_STR", "overridden") };
        override_string(&mut val, "TEST_PIPEMETRICS_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_PIPEMETRICS_STR") };
    }

    #[test]
    #[serial]
    fn env_override_usize_invalid_keeps_original() {
        let mut val = 1000usize;
        // SAFETY: serial 테스트로 실행되므로 환경변수 조작이 다른 테스트와 겹치지 않습니다.
        unsafe { std::env::set_var("TEST_PIPEMETRICS_USIZE_BAD", "lots") };
        override_usize(&mut val, "TEST_PIPEMETRICS_USIZE_BAD");
        assert_eq!(val, 1000);
        unsafe { std::env::remove_var("TEST_PIPEMETRICS_USIZE_BAD") };
    }

    #[test]
    #[serial]
    fn env_override_u16_valid() {
        let mut val = 9000u16;
        // SAFETY: serial 테스트로 실행되므로 환경변수 조작이 다른 테스트와 겹치지 않습니다.
        unsafe { std::env::set_var("TEST_PIPEMETRICS_U16", " 9100 ") };
        override_u16(&mut val, "TEST_PIPEMETRICS_U16");
        assert_eq!(val, 9100);
        unsafe { std::env::remove_var("TEST_PIPEMETRICS_U16") };
    }

    #[test]
    #[serial]
    fn env_override_bool_invalid_keeps_original() {
        let mut val = true;
        // SAFETY: serial 테스트로 실행되므로 환경변수 조작이 다른 테스트와 겹치지 않습니다.
        unsafe { std::env::set_var("TEST_PIPEMETRICS_BOOL_BAD", "yes please") };
        override_bool(&mut val, "TEST_PIPEMETRICS_BOOL_BAD");
        assert!(val);
        unsafe { std::env::remove_var("TEST_PIPEMETRICS_BOOL_BAD") };
    }

    #[test]
    #[serial]
    fn env_override_csv_skips_blank_entries() {
        let mut val = vec!["status".to_owned()];
        // SAFETY: serial 테스트로 실행되므로 환경변수 조작이 다른 테스트와 겹치지 않습니다.
        unsafe { std::env::set_var("TEST_PIPEMETRICS_CSV", "status, hostname,,region ") };
        override_csv(&mut val, "TEST_PIPEMETRICS_CSV");
        assert_eq!(val, vec!["status", "hostname", "region"]);
        unsafe { std::env::remove_var("TEST_PIPEMETRICS_CSV") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_PIPEMETRICS_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = PipemetricsConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = PipemetricsConfig::parse(&toml_str).unwrap();
        assert_eq!(config.session.labels, parsed.session.labels);
        assert_eq!(config.metrics.endpoint, parsed.metrics.endpoint);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = PipemetricsConfig::from_file("/nonexistent/path/pipemetrics.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipemetricsError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
