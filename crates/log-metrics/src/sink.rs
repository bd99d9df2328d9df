//! 카운터 싱크
//!
//! 세션이 집계한 요청/바이트 카운터를 기록하는 경계입니다. 기본 구현
//! [`PrometheusSink`]는 전역 레코더를 설치하지 않고 세션마다 자체
//! `PrometheusRecorder`를 소유하므로, 세션을 새로 만들면 카운터가 초기화되고
//! 서로 다른 세션은 간섭하지 않습니다.

use metrics::Label;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use pipemetrics_core::metrics::{SCALAR_COUNTERS, describe_all};

use crate::LabelSet;

/// 레이블이 붙은 단조 증가 카운터 저장소
pub trait CounterSink: Send + Sync {
    /// `name` 카운터의 `labels` 시계열을 `value`만큼 증가시킵니다.
    fn increment(&self, name: &'static str, labels: &LabelSet, value: u64);
}

/// 세션 전용 Prometheus 레코더를 쓰는 카운터 싱크
pub struct PrometheusSink {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl PrometheusSink {
    /// 새 레코더를 만들고 설명과 스칼라 카운터를 등록합니다.
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            describe_all();
            for name in SCALAR_COUNTERS {
                metrics::counter!(name).increment(0);
            }
        });

        Self { recorder, handle }
    }

    /// 노출 서버에 넘길 렌더링 핸들을 반환합니다.
    pub fn handle(&self) -> PrometheusHandle {
        self.handle.clone()
    }

    /// Prometheus 텍스트 형식으로 렌더링합니다.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl Default for PrometheusSink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PrometheusSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusSink").finish_non_exhaustive()
    }
}

impl CounterSink for PrometheusSink {
    fn increment(&self, name: &'static str, labels: &LabelSet, value: u64) {
        let labels: Vec<Label> = labels
            .iter()
            .map(|(k, v)| Label::new(k.clone(), v.clone()))
            .collect();
        metrics::with_local_recorder(&self.recorder, || {
            metrics::counter!(name, labels).increment(value);
        });
    }
}
