//! `reconpost scan` command handler
//!
//! Runs the orchestrator in-process, polls the job until it settles, and
//! prints progress to stderr so stdout carries only the rendered job.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use reconpost_core::config::ReconpostConfig;
use reconpost_core::{Job, JobStatus, ModuleStatus};
use reconpost_engine::{ScanOrchestrator, ScanRequest};

use crate::cli::ScanArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `scan` command.
pub async fn execute(
    args: ScanArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = ReconpostConfig::load_or_default(config_path).await?;
    let registry = reconpost_modules::default_registry(&config.modules)?;
    let orchestrator = ScanOrchestrator::new(Arc::new(registry), config.scan.clone());

    let request = build_request(&args);
    let interval = Duration::from_millis(args.poll_interval_ms.max(1));

    let outcome = tokio::select! {
        job = run_scan(&orchestrator, request, interval, print_progress) => job,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, cancelling scan");
            orchestrator.shutdown();
            return Err(CliError::Command("scan interrupted".to_owned()));
        }
    };
    orchestrator.shutdown();

    let report = ScanReport { job: outcome? };
    writer.render(&report)?;
    Ok(())
}

/// Translate command-line arguments into a scan request.
pub fn build_request(args: &ScanArgs) -> ScanRequest {
    let mut request = ScanRequest::new(args.target.clone());
    if let Some(kind) = &args.target_type {
        request = request.with_type(kind.clone());
    }
    if !args.modules.is_empty() {
        request = request.with_modules(args.modules.iter().cloned());
    }
    request
}

/// Start a scan and poll it every `interval` until it reaches a terminal state.
///
/// `on_progress` is called whenever the number of settled modules changes.
pub async fn run_scan<F>(
    orchestrator: &ScanOrchestrator,
    request: ScanRequest,
    interval: Duration,
    mut on_progress: F,
) -> Result<Job, CliError>
where
    F: FnMut(&Job),
{
    let job = orchestrator.create_scan(request)?;
    info!(
        job_id = %job.id,
        target = %job.target.value(),
        modules = job.dispatched.len(),
        "scan started"
    );

    let mut reported = None;
    loop {
        let job = orchestrator.get_scan(&job.id)?;
        if reported != Some(job.modules.len()) {
            reported = Some(job.modules.len());
            on_progress(&job);
        }
        if job.status.is_terminal() {
            return Ok(job);
        }
        tokio::time::sleep(interval).await;
    }
}

fn print_progress(job: &Job) {
    let latest = job
        .modules
        .last()
        .map(|m| format!(" (last: {} {})", m.module_id, m.status))
        .unwrap_or_default();
    eprintln!(
        "[{}/{}] modules finished{}",
        job.modules.len(),
        job.dispatched.len(),
        latest
    );
}

/// A finished scan job.
///
/// Serialises exactly like the HTTP API's job snapshot.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ScanReport {
    pub job: Job,
}

impl Render for ScanReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let job = &self.job;
        writeln!(
            w,
            "Scan {} for {} ({})",
            job.id,
            job.target.value().bold(),
            job.target.kind()
        )?;
        let status = job.status.to_string();
        let status = match job.status {
            JobStatus::Completed => status.green().bold(),
            JobStatus::Error => status.red().bold(),
            JobStatus::Queued | JobStatus::Running => status.yellow(),
        };
        writeln!(w, "Status: {}", status)?;
        if let Some(error) = &job.error {
            writeln!(w, "Error: {}", error.red())?;
        }
        writeln!(w)?;

        writeln!(w, "{:<14} {:<9} {:>10}  Error", "Module", "Status", "Duration")?;
        writeln!(w, "{}", "-".repeat(60))?;
        for m in &job.modules {
            let status = match m.status {
                ModuleStatus::Success => "success".green(),
                ModuleStatus::Error => "error".red(),
            };
            writeln!(
                w,
                "{:<14} {:<9} {:>8}ms  {}",
                m.module_id,
                status,
                m.duration_ms,
                m.error.as_deref().unwrap_or("")
            )?;
        }
        writeln!(w)?;

        if job.relationships.is_empty() {
            writeln!(w, "{}", "No relationships found.".yellow())?;
        } else {
            writeln!(w, "Relationships ({}):", job.relationships.len())?;
            for rel in &job.relationships {
                writeln!(w, "  {rel}")?;
            }
        }
        Ok(())
    }
}
