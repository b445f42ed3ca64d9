//! 잡 저장소: `id → entry` 인메모리 맵과 만료 정리
//!
//! 각 잡은 자체 뮤텍스로 보호되며 드라이버 태스크만 기록합니다.
//! 조회는 항상 복제된 스냅샷을 반환합니다.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use reconpost_core::error::JobError;
use reconpost_core::{
    CancellationToken, GraphNode, Job, JobStatus, ModuleResult, Relationship, RelationshipGraph,
};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

/// 잡의 관계 그래프 뷰
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<Relationship>,
}

#[derive(Debug)]
struct JobState {
    job: Job,
    graph: RelationshipGraph,
    settled_at: Option<Instant>,
}

/// 저장소 항목
#[derive(Debug)]
pub struct JobEntry {
    state: Mutex<JobState>,
    cancel: CancellationToken,
    created_at: Instant,
}

impl JobEntry {
    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 잡 취소 토큰
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// 현재 상태의 복제본
    pub fn snapshot(&self) -> Job {
        self.lock().job.clone()
    }

    /// 모듈 결과를 추가하고 관계를 병합합니다.
    ///
    /// 새로 추가된 엣지 수를 반환합니다.
    pub fn record(&self, result: ModuleResult) -> usize {
        let mut state = self.lock();
        let added = state.graph.merge(&result.relationships);
        let count = added.len();
        state.job.relationships.extend(added);
        state.job.modules.push(result);
        count
    }

    /// 모든 모듈이 끝났음을 기록합니다.
    pub fn complete(&self) {
        self.settle(JobStatus::Completed, None);
    }

    /// 오케스트레이터 장애로 잡을 종료합니다.
    pub fn fail(&self, reason: impl Into<String>) {
        self.settle(JobStatus::Error, Some(reason.into()));
    }

    fn settle(&self, status: JobStatus, error: Option<String>) {
        let mut state = self.lock();
        if state.job.status.is_terminal() {
            return;
        }
        state.job.status = status;
        state.job.completed_at = Some(Utc::now());
        state.job.error = error;
        state.settled_at = Some(Instant::now());
    }

    /// 종료 상태 여부
    pub fn is_settled(&self) -> bool {
        self.lock().job.status.is_terminal()
    }

    fn graph(&self) -> JobGraph {
        let state = self.lock();
        JobGraph {
            nodes: state.graph.nodes(),
            edges: state.graph.edges().to_vec(),
        }
    }
}

/// 만료 정리 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeStats {
    /// 보존 기간이 지나 제거된 종료 잡
    pub evicted: usize,
    /// 최대 실행 시간을 넘겨 취소 후 제거된 잡
    pub cancelled: usize,
}

/// 인메모리 잡 저장소
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, Arc<JobEntry>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<JobEntry>>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<JobEntry>>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// 새 잡을 등록합니다.
    pub fn insert(&self, job: Job, cancel: CancellationToken) -> Arc<JobEntry> {
        let id = job.id.clone();
        let entry = Arc::new(JobEntry {
            state: Mutex::new(JobState {
                job,
                graph: RelationshipGraph::new(),
                settled_at: None,
            }),
            cancel,
            created_at: Instant::now(),
        });
        self.write().insert(id, Arc::clone(&entry));
        entry
    }

    /// 항목 조회
    pub fn get(&self, id: &str) -> Result<Arc<JobEntry>, JobError> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::NotFound { id: id.to_owned() })
    }

    /// 잡 스냅샷
    pub fn snapshot(&self, id: &str) -> Result<Job, JobError> {
        self.get(id).map(|entry| entry.snapshot())
    }

    /// 관계 그래프 스냅샷
    pub fn graph(&self, id: &str) -> Result<JobGraph, JobError> {
        self.get(id).map(|entry| entry.graph())
    }

    /// 항목을 제거합니다.
    pub fn remove(&self, id: &str) -> Result<Arc<JobEntry>, JobError> {
        self.write()
            .remove(id)
            .ok_or_else(|| JobError::NotFound { id: id.to_owned() })
    }

    /// 만료된 잡을 정리합니다.
    ///
    /// - 종료 후 `retention`이 지난 잡은 제거합니다.
    /// - 생성 후 `max_runtime`이 지나도 실행 중인 잡은 취소하고 제거합니다.
    pub fn purge(&self, retention: Duration, max_runtime: Duration) -> PurgeStats {
        let now = Instant::now();
        let mut stats = PurgeStats::default();
        self.write().retain(|id, entry| {
            let settled_at = entry.lock().settled_at;
            match settled_at {
                Some(at) if now.duration_since(at) >= retention => {
                    debug!(job_id = %id, "evicting expired job");
                    stats.evicted += 1;
                    false
                }
                None if now.duration_since(entry.created_at) >= max_runtime => {
                    warn!(job_id = %id, "job exceeded maximum runtime, cancelling");
                    entry.cancel.cancel();
                    stats.cancelled += 1;
                    false
                }
                _ => true,
            }
        });
        stats
    }

    /// 모든 잡의 토큰을 취소합니다.
    pub fn cancel_all(&self) {
        for entry in self.read().values() {
            entry.cancel.cancel();
        }
    }

    /// 실행 중인 잡 수
    pub fn active(&self) -> usize {
        self.read().values().filter(|e| !e.is_settled()).count()
    }

    /// 저장된 잡 수
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use reconpost_core::{ModuleDescriptor, ModuleOutput, TargetType, relation, resolve};

    use super::*;

    fn job(id: &str) -> Job {
        let target = resolve("example.com", None).unwrap();
        Job::start(id, target, vec!["dns".to_owned(), "whois".to_owned()])
    }

    fn result_with(edges: Vec<Relationship>) -> ModuleResult {
        let descriptor = ModuleDescriptor::new("dns", "DNS", "test", [TargetType::Domain]);
        let output = ModuleOutput {
            relationships: edges,
            ..ModuleOutput::default()
        };
        ModuleResult::succeeded(&descriptor, output, Duration::from_millis(5))
    }

    #[test]
    fn unknown_job_is_not_found() {
        let store = JobStore::new();
        let err = store.snapshot("nope").unwrap_err();
        assert_eq!(err.to_string(), "scan not found: nope");
    }

    #[test]
    fn record_merges_relationships_first_wins() {
        let store = JobStore::new();
        let entry = store.insert(job("j1"), CancellationToken::new());

        let first = Relationship::new("example.com", "ns1.example.net", relation::HAS_NS)
            .with_label("first");
        let dup = Relationship::new("EXAMPLE.com", "ns1.example.net", relation::HAS_NS)
            .with_label("second");
        assert_eq!(entry.record(result_with(vec![first.clone()])), 1);
        assert_eq!(entry.record(result_with(vec![dup])), 0);

        let snapshot = store.snapshot("j1").unwrap();
        assert_eq!(snapshot.modules.len(), 2);
        assert_eq!(snapshot.relationships, vec![first]);
        assert_eq!(snapshot.pending(), 0);

        let graph = store.graph("j1").unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
    }

    #[test]
    fn concurrent_records_are_serialized() {
        let store = JobStore::new();
        let entry = store.insert(job("j1"), CancellationToken::new());

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let entry = &entry;
                scope.spawn(move || {
                    for i in 0..50 {
                        // 모든 작업자가 공유 엣지 하나와 고유 엣지 하나를 보고합니다.
                        let shared =
                            Relationship::new("example.com", "ns1.example.net", relation::HAS_NS);
                        let own = Relationship::new(
                            "example.com",
                            format!("10.{worker}.0.{i}"),
                            relation::RESOLVES_TO,
                        );
                        entry.record(result_with(vec![shared, own]));
                    }
                });
            }
        });

        let snapshot = store.snapshot("j1").unwrap();
        assert_eq!(snapshot.modules.len(), 400);
        assert_eq!(snapshot.relationships.len(), 401);
        let graph = store.graph("j1").unwrap();
        assert_eq!(graph.edges, snapshot.relationships);
    }

    #[test]
    fn settle_happens_once() {
        let store = JobStore::new();
        let entry = store.insert(job("j1"), CancellationToken::new());
        entry.complete();
        entry.fail("late failure");
        let snapshot = entry.snapshot();
        assert_eq!(snapshot.status, JobStatus::Completed);
        assert!(snapshot.completed_at.is_some());
        assert!(snapshot.error.is_none());
        assert_eq!(store.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_evicts_settled_and_cancels_runaway_jobs() {
        let store = JobStore::new();
        let done = store.insert(job("done"), CancellationToken::new());
        let running_token = CancellationToken::new();
        store.insert(job("running"), running_token.clone());
        store.insert(job("fresh-run"), CancellationToken::new());
        done.complete();

        tokio::time::advance(Duration::from_secs(30)).await;
        let fresh = store.insert(job("fresh-done"), CancellationToken::new());
        fresh.complete();

        let stats = store.purge(Duration::from_secs(20), Duration::from_secs(25));
        assert_eq!(stats, PurgeStats { evicted: 1, cancelled: 2 });
        assert!(running_token.is_cancelled());
        assert!(store.snapshot("done").is_err());
        assert!(store.snapshot("running").is_err());
        assert!(store.snapshot("fresh-done").is_ok());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_unknown_is_not_found() {
        let store = JobStore::new();
        assert!(store.remove("missing").is_err());
    }

    #[test]
    fn cancel_all_cancels_every_token() {
        let store = JobStore::new();
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        store.insert(job("a"), a.clone());
        store.insert(job("b"), b.clone());
        store.cancel_all();
        assert!(a.is_cancelled() && b.is_cancelled());
    }
}
