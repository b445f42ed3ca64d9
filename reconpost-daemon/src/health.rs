//! Daemon health reporting.
//!
//! The daemon is `ok` while at least one module is registered and the
//! orchestrator accepts scans; with every module disabled it reports
//! `degraded` because no scan could be dispatched.

use std::time::Instant;

use serde::Serialize;

use reconpost_engine::ScanOrchestrator;

/// Overall daemon status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

/// Health report served at `GET /api/health`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonHealth {
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Scan jobs still running.
    pub active_jobs: usize,
    /// Modules available for dispatch.
    pub registered_modules: usize,
}

/// Derive the overall status from the registered module count.
pub fn aggregate_status(registered_modules: usize) -> HealthStatus {
    if registered_modules == 0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Ok
    }
}

/// Build a health report for the running daemon.
pub fn report(orchestrator: &ScanOrchestrator, started: Instant) -> DaemonHealth {
    let registered_modules = orchestrator.module_count();
    DaemonHealth {
        status: aggregate_status(registered_modules),
        uptime_secs: started.elapsed().as_secs(),
        active_jobs: orchestrator.active_jobs(),
        registered_modules,
    }
}
