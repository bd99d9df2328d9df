//! FIFO(named pipe) 수집기
//!
//! 웹 서버가 접근 로그를 쓰는 FIFO를 읽기 전용 논블로킹 핸들로 열고, 줄
//! 단위로 읽어 패스스루 싱크에 그대로 쓴 뒤 [`MetricsSession`]에 넘깁니다.
//!
//! # 상태 전이
//! ```text
//!          EOF (모든 writer 종료)
//! Reading ─────────────────────────> Reopening
//!    ^                                   │
//!    └──────── 같은 경로 다시 열기 ───────┘
//! ```
//! 재귀 없이 하나의 `loop`로 구현되며, 재오픈 실패와 읽기/패스스루 쓰기
//! 실패는 치명적 에러로 루프를 끝냅니다.

use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use nix::sys::stat::Mode;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::unix::pipe;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::CollectorStatus;
use crate::error::LogMetricsError;
use crate::processor::MetricsSession;

/// FIFO 파일 권한
pub const FIFO_MODE: u32 = 0o666;

/// 한 줄 읽기 버퍼의 초기 용량
const LINE_CAPACITY: usize = 4 * 1024;

/// `path`에 FIFO를 새로 만듭니다.
///
/// 기존 파일은 지우고(없으면 무시) mode 0666으로 만든 뒤, umask 영향을
/// 없애기 위해 권한을 다시 0666으로 설정합니다.
pub fn create_fifo(path: &Path) -> Result<(), LogMetricsError> {
    let shown = path.display().to_string();

    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %shown, "removed existing file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(LogMetricsError::collector(
                &shown,
                format!("failed to remove existing file: {e}"),
            ));
        }
    }

    nix::unistd::mkfifo(path, Mode::from_bits_truncate(FIFO_MODE)).map_err(|e| {
        LogMetricsError::collector(&shown, format!("mkfifo failed: {e}"))
    })?;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(FIFO_MODE)).map_err(|e| {
        LogMetricsError::collector(&shown, format!("failed to set permissions: {e}"))
    })?;

    info!(path = %shown, "created fifo");
    Ok(())
}

/// FIFO를 읽기 전용 논블로킹 핸들로 엽니다.
///
/// writer가 없어도 열기는 성공하며, 첫 writer가 연결될 때까지 읽기가
/// 대기합니다.
pub fn open_fifo_receiver(path: &Path) -> Result<pipe::Receiver, LogMetricsError> {
    pipe::OpenOptions::new().open_receiver(path).map_err(|e| {
        LogMetricsError::collector(path.display().to_string(), format!("open failed: {e}"))
    })
}

/// FIFO에 쓰기 핸들을 하나 열어 둡니다.
///
/// 이 핸들이 살아 있는 동안 reader는 EOF를 보지 않습니다. reader가 먼저
/// 열려 있어야 합니다.
pub fn open_fifo_keepalive(path: &Path) -> Result<pipe::Sender, LogMetricsError> {
    pipe::OpenOptions::new().open_sender(path).map_err(|e| {
        LogMetricsError::collector(
            path.display().to_string(),
            format!("keepalive writer open failed: {e}"),
        )
    })
}

/// 수집 루프 종료 시 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorSummary {
    /// 읽은 줄 수 (JSON 실패 포함)
    pub lines: u64,
    /// JSON 디코딩 실패 수
    pub parse_errors: u64,
    /// EOF 후 재오픈 횟수
    pub reopens: u64,
}

/// FIFO 수집기
///
/// `W`는 패스스루 싱크, `E`는 진단 메시지 싱크입니다. 데몬에서는 각각
/// stdout/stderr이며 테스트에서는 임의의 `AsyncWrite`를 씁니다.
pub struct FifoCollector<W, E> {
    path: PathBuf,
    session: MetricsSession,
    passthrough: W,
    diagnostics: E,
    cancel_token: CancellationToken,
    status: CollectorStatus,
    summary: CollectorSummary,
}

impl<W, E> FifoCollector<W, E>
where
    W: AsyncWrite + Unpin + Send,
    E: AsyncWrite + Unpin + Send,
{
    /// 새 FIFO 수집기를 생성합니다.
    pub fn new(
        path: impl Into<PathBuf>,
        session: MetricsSession,
        passthrough: W,
        diagnostics: E,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            path: path.into(),
            session,
            passthrough,
            diagnostics,
            cancel_token,
            status: CollectorStatus::Idle,
            summary: CollectorSummary::default(),
        }
    }

    /// 이미 열린 `receiver`로 수집 루프를 실행합니다.
    ///
    /// 취소되면 `Ok`로, 치명적 에러가 나면 `Err`로 끝납니다.
    pub async fn run(
        &mut self,
        receiver: pipe::Receiver,
    ) -> Result<CollectorSummary, LogMetricsError> {
        self.status = CollectorStatus::Running;
        info!(path = %self.path.display(), "fifo collector started");

        let result = self.read_loop(receiver).await;
        match &result {
            Ok(summary) => {
                self.status = CollectorStatus::Stopped;
                info!(
                    lines = summary.lines,
                    parse_errors = summary.parse_errors,
                    reopens = summary.reopens,
                    "fifo collector stopped"
                );
            }
            Err(e) => {
                self.status = CollectorStatus::Error(e.to_string());
                error!(error = %e, "fifo collector terminated");
            }
        }
        result
    }

    async fn read_loop(
        &mut self,
        receiver: pipe::Receiver,
    ) -> Result<CollectorSummary, LogMetricsError> {
        let mut reader = BufReader::new(receiver);
        let mut line = Vec::with_capacity(LINE_CAPACITY);

        loop {
            line.clear();
            let read = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    return Ok(self.summary);
                }
                result = reader.read_until(b'\n', &mut line) => result,
            };

            let n = read.map_err(|e| self.fatal(format!("read failed: {e}")))?;
            if n > 0 {
                self.forward(&line).await?;
                continue;
            }

            // EOF: 모든 writer가 닫힘
            if self.cancel_token.is_cancelled() {
                return Ok(self.summary);
            }
            drop(reader);
            debug!(path = %self.path.display(), "writers closed, reopening fifo");
            let receiver = open_fifo_receiver(&self.path)?;
            reader = BufReader::new(receiver);
            self.summary.reopens += 1;
            info!(path = %self.path.display(), reopens = self.summary.reopens, "fifo reopened");
        }
    }

    async fn forward(&mut self, line: &[u8]) -> Result<(), LogMetricsError> {
        self.summary.lines += 1;

        self.passthrough
            .write_all(line)
            .await
            .map_err(|e| self.fatal(format!("passthrough write failed: {e}")))?;
        self.passthrough
            .flush()
            .await
            .map_err(|e| self.fatal(format!("passthrough flush failed: {e}")))?;

        match self.session.process_line(line) {
            Ok(recorded) => {
                if let Some(diagnostic) = recorded.coordinates.and_then(|c| c.diagnostic()) {
                    self.diagnose(&diagnostic).await;
                }
            }
            Err(e) => {
                self.summary.parse_errors += 1;
                self.diagnose(&format!("json decode failed: {e}")).await;
            }
        }
        Ok(())
    }

    /// 진단 메시지를 한 줄씩 씁니다. 쓰기 실패는 로그만 남깁니다.
    async fn diagnose(&mut self, message: &str) {
        for text in message.lines() {
            let mut out = Vec::with_capacity(text.len() + 1);
            out.extend_from_slice(text.as_bytes());
            out.push(b'\n');
            if let Err(e) = self.diagnostics.write_all(&out).await {
                warn!(error = %e, "failed to write diagnostic");
                return;
            }
        }
        if let Err(e) = self.diagnostics.flush().await {
            warn!(error = %e, "failed to flush diagnostics");
        }
    }

    fn fatal(&self, reason: String) -> LogMetricsError {
        LogMetricsError::collector(self.path.display().to_string(), reason)
    }

    /// 현재 상태를 반환합니다.
    pub fn status(&self) -> &CollectorStatus {
        &self.status
    }

    /// 지금까지의 요약을 반환합니다.
    pub fn summary(&self) -> CollectorSummary {
        self.summary
    }
}
