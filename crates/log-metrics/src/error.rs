//! 로그 메트릭 에러 타입
//!
//! [`LogMetricsError`]는 수집 세션 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogMetricsError> for PipemetricsError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use pipemetrics_core::error::{PipelineError, PipemetricsError};

/// 로그 메트릭 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogMetricsError {
    /// 로그 라인 디코딩 실패
    #[error("parse error at column {column}: {reason}")]
    Parse {
        /// 실패 위치 (1부터 시작하는 열 번호, 알 수 없으면 0)
        column: usize,
        /// 실패 사유
        reason: String,
    },

    /// 수집기 에러 (FIFO 생성/열기/읽기, 패스스루 쓰기)
    #[error("collector error: {path}: {reason}")]
    Collector {
        /// FIFO 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LogMetricsError {
    /// 수집기 에러를 생성합니다.
    pub(crate) fn collector(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Collector {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for LogMetricsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            column: err.column(),
            reason: err.to_string(),
        }
    }
}

impl From<LogMetricsError> for PipemetricsError {
    fn from(err: LogMetricsError) -> Self {
        match err {
            LogMetricsError::Io(e) => PipemetricsError::Io(e),
            LogMetricsError::Collector { .. } => {
                PipemetricsError::Pipeline(PipelineError::Terminated(err.to_string()))
            }
            other => PipemetricsError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}

/// 좌표 추출/변환 실패 사유
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeoError {
    /// `"<lat>,<lon>"` 형태로 나눌 수 없음
    #[error("cannot split '{raw}' into a lat,lon pair")]
    Extract {
        /// 원본 문자열
        raw: String,
    },

    /// 부동소수점으로 변환할 수 없음
    #[error("cannot convert lat '{lat}' / lon '{lon}' to numbers")]
    Convert {
        /// 원본 위도 문자열
        lat: String,
        /// 원본 경도 문자열
        lon: String,
    },

    /// geohash 인코딩 범위를 벗어남
    #[error("coordinates out of range: lat {lat}, lon {lon}")]
    OutOfRange {
        /// 위도
        lat: f64,
        /// 경도
        lon: f64,
    },
}
