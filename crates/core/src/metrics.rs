//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `reconpost_`
//! - 영역: `scan_`, `module_`, `graph_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(reconpost_core::metrics::SCANS_CREATED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 모듈 레이블 키
pub const LABEL_MODULE: &str = "module";

/// 결과 레이블 키 (success, error, timeout, cancelled)
pub const LABEL_RESULT: &str = "result";

/// 잡 상태 레이블 키 (completed, error, cancelled)
pub const LABEL_STATUS: &str = "status";

/// 타겟 타입 레이블 키
pub const LABEL_TARGET_TYPE: &str = "target_type";

// ─── Scan 메트릭 ────────────────────────────────────────────────────

/// 생성된 스캔 수 (counter, label: target_type)
pub const SCANS_CREATED_TOTAL: &str = "reconpost_scans_created_total";

/// 종료된 스캔 수 (counter, label: status)
pub const SCANS_FINISHED_TOTAL: &str = "reconpost_scans_finished_total";

/// 실행 중인 스캔 수 (gauge)
pub const SCANS_ACTIVE: &str = "reconpost_scans_active";

/// 스위퍼가 제거한 잡 수 (counter)
pub const JOBS_EVICTED_TOTAL: &str = "reconpost_jobs_evicted_total";

// ─── Module 메트릭 ──────────────────────────────────────────────────

/// 모듈 실행 수 (counter, labels: module, result)
pub const MODULE_RUNS_TOTAL: &str = "reconpost_module_runs_total";

/// 모듈 실행 시간 (histogram, 초, label: module)
pub const MODULE_DURATION_SECONDS: &str = "reconpost_module_duration_seconds";

// ─── Graph 메트릭 ───────────────────────────────────────────────────

/// 그래프에 새로 병합된 관계 수 (counter)
pub const GRAPH_RELATIONSHIPS_MERGED_TOTAL: &str = "reconpost_graph_relationships_merged_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "reconpost_daemon_uptime_seconds";

/// Daemon: 등록된 모듈 수 (gauge)
pub const DAEMON_MODULES_REGISTERED: &str = "reconpost_daemon_modules_registered";

/// Daemon: 빌드 정보 (gauge, 항상 1, labels: version, rust_version)
pub const DAEMON_BUILD_INFO: &str = "reconpost_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 모듈 실행 시간 히스토그램 버킷 (초)
///
/// 10ms ~ 120s 범위 (외부 API 호출 포함)
pub const MODULE_DURATION_BUCKETS: [f64; 10] =
    [0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 30.0, 120.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(SCANS_CREATED_TOTAL, "Total number of scan jobs created");
    describe_counter!(
        SCANS_FINISHED_TOTAL,
        "Total number of scan jobs that reached a terminal state"
    );
    describe_gauge!(SCANS_ACTIVE, "Number of scan jobs currently running");
    describe_counter!(
        JOBS_EVICTED_TOTAL,
        "Total number of jobs removed by the retention sweeper"
    );

    describe_counter!(
        MODULE_RUNS_TOTAL,
        "Total number of module executions by module and result"
    );
    describe_histogram!(
        MODULE_DURATION_SECONDS,
        "Wall-clock duration of a single module execution in seconds"
    );

    describe_counter!(
        GRAPH_RELATIONSHIPS_MERGED_TOTAL,
        "Total number of new relationships merged into job graphs"
    );

    describe_gauge!(DAEMON_UPTIME_SECONDS, "reconpost daemon uptime in seconds");
    describe_gauge!(
        DAEMON_MODULES_REGISTERED,
        "Number of recon modules registered in the daemon"
    );
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version labels)"
    );
}
