//! 스캔 오케스트레이터: 잡 생성, 모듈 디스패치, 조회, 취소, 만료 정리
//!
//! # 잡 생명주기
//! ```text
//! create_scan ─▶ running ─▶ (모든 모듈 종료) ─▶ completed
//!                   │
//!                   └─▶ (드라이버 태스크 장애) ─▶ error
//! ```
//!
//! 모듈 실패는 잡을 실패시키지 않습니다. 잡 단위 `error`는 드라이버 태스크가
//! 패닉했을 때만 기록됩니다.
//!
//! # 동시성
//!
//! 한 잡의 모듈은 동시에 실행됩니다. 전역 세마포어가 모든 잡에 걸친 동시 실행 모듈 수를
//! 제한하며, 모듈별 데드라인은 허가를 얻은 뒤부터 계산됩니다.

use std::sync::Arc;
use std::time::Duration;

use reconpost_core::config::ScanConfig;
use reconpost_core::error::{JobError, ValidationError};
use reconpost_core::metrics as m;
use reconpost_core::{
    CancellationToken, DynModule, Job, ModuleDescriptor, ModuleError, ModuleRegistry,
    ModuleResult, Target, TargetType, resolve,
};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::runner;
use crate::store::{JobEntry, JobGraph, JobStore};

/// 스캔 요청
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanRequest {
    /// 원시 타겟 문자열
    pub target: String,
    /// 명시적 타겟 타입 (생략 시 추론)
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// 실행할 모듈 ID (생략 또는 빈 목록이면 적용 가능한 전체)
    #[serde(default)]
    pub modules: Option<Vec<String>>,
}

impl ScanRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules = Some(modules.into_iter().map(Into::into).collect());
        self
    }
}

struct Inner {
    registry: Arc<ModuleRegistry>,
    store: JobStore,
    permits: Arc<Semaphore>,
    config: ScanConfig,
    shutdown: CancellationToken,
}

/// 스캔 오케스트레이터
///
/// 복제 비용이 낮으며 모든 복제본이 같은 잡 저장소를 공유합니다.
#[derive(Clone)]
pub struct ScanOrchestrator {
    inner: Arc<Inner>,
}

impl ScanOrchestrator {
    /// 레지스트리와 스캔 설정으로 오케스트레이터를 생성합니다.
    pub fn new(registry: Arc<ModuleRegistry>, config: ScanConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_modules.max(1)));
        Self {
            inner: Arc::new(Inner {
                registry,
                store: JobStore::new(),
                permits,
                config,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// 새 스캔을 시작하고 즉시 `running` 상태의 잡을 반환합니다.
    ///
    /// 검증 에러는 잡을 만들기 전에 반환됩니다.
    pub fn create_scan(&self, request: ScanRequest) -> Result<Job, ValidationError> {
        let kind = request
            .kind
            .as_deref()
            .map(str::parse::<TargetType>)
            .transpose()?;
        let target = resolve(&request.target, kind)?;
        let modules = self
            .inner
            .registry
            .select(target.kind(), request.modules.as_deref())?;

        let id = Uuid::new_v4().to_string();
        let dispatched: Vec<String> = modules.iter().map(|m| m.descriptor().id.clone()).collect();
        let job = Job::start(id.as_str(), target.clone(), dispatched);
        let entry = self
            .inner
            .store
            .insert(job.clone(), self.inner.shutdown.child_token());

        info!(
            job_id = %id,
            target = %target.value(),
            target_type = %target.kind(),
            modules = modules.len(),
            "scan created"
        );
        metrics::counter!(m::SCANS_CREATED_TOTAL, m::LABEL_TARGET_TYPE => target.kind().as_str())
            .increment(1);
        metrics::gauge!(m::SCANS_ACTIVE).increment(1.0);

        let driver = tokio::spawn(
            drive(Arc::clone(&self.inner), Arc::clone(&entry), target, modules)
                .instrument(info_span!("scan", job_id = %id)),
        );
        tokio::spawn(watch(id, entry, driver));

        Ok(job)
    }

    /// 잡 스냅샷을 반환합니다.
    pub fn get_scan(&self, id: &str) -> Result<Job, JobError> {
        self.inner.store.snapshot(id)
    }

    /// 잡의 관계 그래프를 반환합니다.
    pub fn get_graph(&self, id: &str) -> Result<JobGraph, JobError> {
        self.inner.store.graph(id)
    }

    /// 잡을 취소하고 저장소에서 제거합니다.
    ///
    /// 실행 중인 모든 모듈에 취소가 전파되며 이후 조회는 `NotFound`입니다.
    pub fn cancel_scan(&self, id: &str) -> Result<(), JobError> {
        let entry = self.inner.store.remove(id)?;
        entry.cancel_token().cancel();
        info!(job_id = %id, "scan cancelled");
        Ok(())
    }

    /// 등록된 모듈 디스크립터 (등록 순서)
    pub fn list_modules(&self) -> Vec<ModuleDescriptor> {
        self.inner.registry.list()
    }

    /// 등록된 모듈 수
    pub fn module_count(&self) -> usize {
        self.inner.registry.count()
    }

    /// 실행 중인 잡 수
    pub fn active_jobs(&self) -> usize {
        self.inner.store.active()
    }

    /// 만료 잡 정리 태스크를 시작합니다.
    ///
    /// [`shutdown`](Self::shutdown) 호출 시 종료됩니다.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.sweep_interval());
            // 첫 tick은 즉시 완료됨
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = inner.shutdown.cancelled() => {
                        debug!("sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let stats = inner
                            .store
                            .purge(inner.config.job_retention(), inner.config.max_job_runtime());
                        let removed = stats.evicted + stats.cancelled;
                        if removed > 0 {
                            info!(
                                evicted = stats.evicted,
                                cancelled = stats.cancelled,
                                remaining = inner.store.len(),
                                "expired jobs removed"
                            );
                            metrics::counter!(m::JOBS_EVICTED_TOTAL).increment(removed as u64);
                        }
                    }
                }
            }
        })
    }

    /// 모든 잡을 취소하고 스위퍼를 멈춥니다.
    pub fn shutdown(&self) {
        info!(active_jobs = self.active_jobs(), "orchestrator shutting down");
        self.inner.shutdown.cancel();
        self.inner.store.cancel_all();
    }
}

/// 잡 드라이버: 모듈을 디스패치하고 완료 순서대로 결과를 기록합니다.
async fn drive(
    inner: Arc<Inner>,
    entry: Arc<JobEntry>,
    target: Target,
    modules: Vec<Arc<dyn DynModule>>,
) {
    let cancel = entry.cancel_token().clone();
    let timeout = inner.config.module_timeout();

    let mut tasks = JoinSet::new();
    for module in modules {
        let permits = Arc::clone(&inner.permits);
        let target = target.clone();
        let cancel = cancel.clone();
        let span = info_span!("module", module_id = %module.descriptor().id);
        tasks.spawn(
            async move { dispatch(module, &target, timeout, &cancel, &permits).await }
                .instrument(span),
        );
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => {
                let added = entry.record(result);
                metrics::counter!(m::GRAPH_RELATIONSHIPS_MERGED_TOTAL).increment(added as u64);
            }
            Err(err) => {
                error!(error = %err, "module dispatch task failed");
                entry.fail(format!("module dispatch task failed: {err}"));
                return;
            }
        }
    }
    entry.complete();
}

/// 허가를 얻은 뒤 러너로 모듈을 실행합니다.
async fn dispatch(
    module: Arc<dyn DynModule>,
    target: &Target,
    timeout: Duration,
    cancel: &CancellationToken,
    permits: &Arc<Semaphore>,
) -> ModuleResult {
    let permit = tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        acquired = Arc::clone(permits).acquire_owned() => acquired.ok(),
    };
    match permit {
        Some(_permit) => runner::execute(module, target, timeout, cancel).await,
        None => ModuleResult::failed(module.descriptor(), &ModuleError::Cancelled, Duration::ZERO),
    }
}

/// 드라이버 종료를 감시하고 장애를 잡 에러로 기록합니다.
async fn watch(id: String, entry: Arc<JobEntry>, driver: JoinHandle<()>) {
    if let Err(err) = driver.await {
        warn!(job_id = %id, error = %err, "job driver terminated abnormally");
        entry.fail(format!("job driver failed: {err}"));
    }
    let job = entry.snapshot();
    info!(
        job_id = %id,
        status = %job.status,
        modules = job.modules.len(),
        failed = job.failed_modules(),
        relationships = job.relationships.len(),
        "scan finished"
    );
    metrics::gauge!(m::SCANS_ACTIVE).decrement(1.0);
    metrics::counter!(m::SCANS_FINISHED_TOTAL, m::LABEL_STATUS => job.status.to_string())
        .increment(1);
}
