//! 파이프라인 생명주기 -- FIFO 준비, 수집 태스크 실행, 종료를 관리합니다.
//!
//! [`MetricsPipeline`]은 core의 [`Pipeline`](pipemetrics_core::pipeline::Pipeline) trait을
//! 구현하여 데몬에서 start/stop/health_check 흐름으로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! FIFO -> FifoCollector -> passthrough (stdout)
//!              │
//!              v
//!        MetricsSession -> PrometheusSink <- PrometheusHandle (노출 서버)
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::io::AsyncWrite;
use tokio::net::unix::pipe;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pipemetrics_core::error::{PipelineError, PipemetricsError};
use pipemetrics_core::pipeline::{HealthStatus, Pipeline};

use crate::collector::{
    CollectorSummary, FifoCollector, create_fifo, open_fifo_keepalive, open_fifo_receiver,
};
use crate::config::PipelineConfig;
use crate::error::LogMetricsError;
use crate::processor::MetricsSession;
use crate::sink::PrometheusSink;

/// 패스스루/진단 출력 대상
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

type IngestTask = JoinHandle<Result<CollectorSummary, LogMetricsError>>;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 수집 태스크가 에러로 끝남
    Failed(String),
    /// 정지됨
    Stopped,
}

/// 시작 시 수집 태스크로 넘어가는 부품
struct PendingRun {
    session: MetricsSession,
    passthrough: BoxedWriter,
    diagnostics: BoxedWriter,
}

/// 메트릭 파이프라인
///
/// 세션은 빌드 시 한 번 만들어지고 `start()`에서 수집 태스크로 이동합니다.
/// 정지 후 다시 시작하려면 새 파이프라인을 빌드해야 하며, 이때 카운터와
/// hostname 집합도 새로 시작합니다.
///
/// # 사용 예시
/// ```ignore
/// use pipemetrics_core::pipeline::Pipeline;
/// use pipemetrics_log_metrics::MetricsPipelineBuilder;
///
/// let mut pipeline = MetricsPipelineBuilder::new().config(config).build()?;
/// let handle = pipeline.handle();   // 노출 서버에 전달
/// pipeline.start().await?;
/// ```
pub struct MetricsPipeline {
    config: PipelineConfig,
    state: PipelineState,
    sink: Arc<PrometheusSink>,
    // 헬스체크 future가 Send이려면 &Self가 Send여야 하므로 Mutex로 감쌈
    pending: Mutex<Option<PendingRun>>,
    cancel_token: CancellationToken,
    keepalive: Option<pipe::Sender>,
    task: Option<IngestTask>,
}

impl MetricsPipeline {
    /// 현재 상태 이름을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Failed(_) => "failed",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 파이프라인 설정을 반환합니다.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 노출 서버에 넘길 렌더링 핸들을 반환합니다.
    pub fn handle(&self) -> PrometheusHandle {
        self.sink.handle()
    }

    /// 현재 카운터를 Prometheus 텍스트 형식으로 렌더링합니다.
    pub fn render(&self) -> String {
        self.sink.render()
    }

    /// 수집 태스크가 끝날 때까지 기다립니다.
    ///
    /// 취소로 끝나면 `Ok`, 치명적 전송 에러로 끝나면 그 에러를 반환합니다.
    /// `select!` 안에서 써도 안전하며, 태스크가 없으면 `NotRunning`입니다.
    pub async fn wait_fatal(&mut self) -> Result<(), PipemetricsError> {
        let Some(task) = self.task.as_mut() else {
            return Err(PipelineError::NotRunning.into());
        };
        let outcome = task.await;
        self.task = None;

        match outcome {
            Ok(Ok(summary)) => {
                info!(lines = summary.lines, "ingestion task finished");
                self.state = PipelineState::Stopped;
                Ok(())
            }
            Ok(Err(e)) => {
                self.state = PipelineState::Failed(e.to_string());
                Err(e.into())
            }
            Err(e) => {
                self.state = PipelineState::Failed(e.to_string());
                Err(PipelineError::Terminated(e.to_string()).into())
            }
        }
    }

    fn prepare_fifo(&self) -> Result<pipe::Receiver, LogMetricsError> {
        if self.config.create_fifo {
            create_fifo(&self.config.fifo_path)?;
        }
        open_fifo_receiver(&self.config.fifo_path)
    }
}

impl Pipeline for MetricsPipeline {
    async fn start(&mut self) -> Result<(), PipemetricsError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        if self
            .pending
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
        {
            return Err(PipelineError::InitFailed(
                "session already consumed, build a new pipeline".to_owned(),
            )
            .into());
        }

        info!(path = %self.config.fifo_path.display(), "starting metrics pipeline");

        let receiver = self
            .prepare_fifo()
            .map_err(|e| PipelineError::InitFailed(e.to_string()))?;
        info!(path = %self.config.fifo_path.display(), "fifo opened");

        if self.config.keepalive_writer {
            let sender = open_fifo_keepalive(&self.config.fifo_path)
                .map_err(|e| PipelineError::InitFailed(e.to_string()))?;
            self.keepalive = Some(sender);
        }

        let Some(parts) = self
            .pending
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return Err(PipelineError::InitFailed("session already consumed".to_owned()).into());
        };

        let mut collector = FifoCollector::new(
            self.config.fifo_path.clone(),
            parts.session,
            parts.passthrough,
            parts.diagnostics,
            self.cancel_token.clone(),
        );
        self.task = Some(tokio::spawn(async move { collector.run(receiver).await }));

        self.state = PipelineState::Running;
        info!("metrics pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), PipemetricsError> {
        if !matches!(
            self.state,
            PipelineState::Running | PipelineState::Failed(_)
        ) {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping metrics pipeline");
        self.cancel_token.cancel();
        self.keepalive = None;

        if let Some(task) = self.task.take() {
            match task.await {
                Ok(Ok(summary)) => info!(
                    lines = summary.lines,
                    parse_errors = summary.parse_errors,
                    reopens = summary.reopens,
                    "ingestion task joined"
                ),
                Ok(Err(e)) => warn!(error = %e, "ingestion task had already failed"),
                Err(e) => warn!(error = %e, "ingestion task panicked"),
            }
        }

        self.state = PipelineState::Stopped;
        info!("metrics pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match &self.state {
            PipelineState::Running => match &self.task {
                Some(task) if !task.is_finished() => HealthStatus::Healthy,
                _ => HealthStatus::Unhealthy("ingestion task ended".to_owned()),
            },
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Failed(reason) => HealthStatus::Unhealthy(reason.clone()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 메트릭 파이프라인 빌더
///
/// 출력 대상을 지정하지 않으면 패스스루는 stdout, 진단은 stderr입니다.
pub struct MetricsPipelineBuilder {
    config: PipelineConfig,
    passthrough: Option<BoxedWriter>,
    diagnostics: Option<BoxedWriter>,
    cancel_token: Option<CancellationToken>,
}

impl MetricsPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            passthrough: None,
            diagnostics: None,
            cancel_token: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 원본 줄을 그대로 쓸 대상을 지정합니다.
    pub fn passthrough(mut self, writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.passthrough = Some(Box::new(writer));
        self
    }

    /// 진단 메시지를 쓸 대상을 지정합니다.
    pub fn diagnostics(mut self, writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.diagnostics = Some(Box::new(writer));
        self
    }

    /// 상위 취소 토큰을 연결합니다. 파이프라인은 그 자식 토큰을 씁니다.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// 설정을 검증하고 새 세션과 싱크로 파이프라인을 빌드합니다.
    pub fn build(self) -> Result<MetricsPipeline, LogMetricsError> {
        self.config.validate()?;

        let sink = Arc::new(PrometheusSink::new());
        let session = MetricsSession::new(&self.config.session, sink.clone())?;

        let pending = PendingRun {
            session,
            passthrough: self
                .passthrough
                .unwrap_or_else(|| Box::new(tokio::io::stdout())),
            diagnostics: self
                .diagnostics
                .unwrap_or_else(|| Box::new(tokio::io::stderr())),
        };

        let cancel_token = self
            .cancel_token
            .map(|parent| parent.child_token())
            .unwrap_or_default();

        Ok(MetricsPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            sink,
            pending: Mutex::new(Some(pending)),
            cancel_token,
            keepalive: None,
            task: None,
        })
    }
}

impl Default for MetricsPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
