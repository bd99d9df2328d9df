//! 로그 수집 모듈 -- FIFO에서 접근 로그 줄을 읽어 세션에 넘깁니다.
//!
//! # 수집 소스
//! - [`FifoCollector`]: named pipe 수집기 (EOF 시 같은 경로를 다시 엶)
//!
//! 수집기는 자체 tokio 태스크에서 실행되며 세션을 단독으로 소유합니다.

pub mod fifo;

pub use fifo::{
    CollectorSummary, FifoCollector, create_fifo, open_fifo_keepalive, open_fifo_receiver,
};

/// 수집기 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorStatus {
    /// 실행 대기 중
    Idle,
    /// 실행 중
    Running,
    /// 에러로 중단됨
    Error(String),
    /// 정상 종료됨
    Stopped,
}

impl CollectorStatus {
    /// 상태 이름을 반환합니다.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Error(_) => "error",
            Self::Stopped => "stopped",
        }
    }
}
