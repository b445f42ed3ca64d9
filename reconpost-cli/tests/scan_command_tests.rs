//! Integration tests for `reconpost scan` polling and rendering.
//!
//! Uses an in-process orchestrator over mock modules.

use std::sync::Arc;
use std::time::Duration;

use reconpost_cli::cli::OutputFormat;
use reconpost_cli::commands::scan::{ScanReport, run_scan};
use reconpost_cli::error::CliError;
use reconpost_cli::output::OutputWriter;
use reconpost_core::config::ScanConfig;
use reconpost_core::{
    CancellationToken, JobStatus, ModuleDescriptor, ModuleError, ModuleOutput, ModuleRegistry,
    ReconModule, Relationship, Target, TargetType, relation,
};
use reconpost_engine::{ScanOrchestrator, ScanRequest};

struct Delayed {
    descriptor: ModuleDescriptor,
    delay: Duration,
    fail: bool,
}

impl ReconModule for Delayed {
    fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    async fn run(
        &self,
        target: &Target,
        _cancel: CancellationToken,
    ) -> Result<ModuleOutput, ModuleError> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(ModuleError::Probe("upstream refused".to_owned()));
        }
        Ok(ModuleOutput {
            relationships: vec![
                Relationship::new(target.value(), "ns1.example.net", relation::HAS_NS)
                    .with_label(self.descriptor.id.clone()),
            ],
            ..ModuleOutput::default()
        })
    }
}

fn orchestrator() -> ScanOrchestrator {
    let mut registry = ModuleRegistry::new();
    for (id, delay, fail) in [("fast", 10, false), ("slow", 80, false), ("broken", 40, true)] {
        registry
            .register(Delayed {
                descriptor: ModuleDescriptor::new(id, id, "test module", [TargetType::Domain]),
                delay: Duration::from_millis(delay),
                fail,
            })
            .unwrap();
    }
    ScanOrchestrator::new(Arc::new(registry), ScanConfig::default())
}

#[tokio::test]
async fn test_run_scan_polls_until_completed() {
    let orchestrator = orchestrator();
    let mut progress = Vec::new();

    let job = run_scan(
        &orchestrator,
        ScanRequest::new("example.com"),
        Duration::from_millis(5),
        |job| progress.push(job.modules.len()),
    )
    .await
    .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.modules.len(), 3);
    assert_eq!(job.failed_modules(), 1, "module failure does not fail the job");
    assert_eq!(job.relationships.len(), 1, "duplicate edges are merged");
    assert_eq!(job.relationships[0].label.as_deref(), Some("fast"));

    assert_eq!(progress.first(), Some(&0));
    assert_eq!(progress.last(), Some(&3));
    assert!(progress.windows(2).all(|w| w[0] < w[1]), "{progress:?}");
}

#[tokio::test]
async fn test_run_scan_rejects_invalid_request() {
    let orchestrator = orchestrator();

    let err = run_scan(
        &orchestrator,
        ScanRequest::new("example.com").with_modules(["missing"]),
        Duration::from_millis(5),
        |_| {},
    )
    .await
    .unwrap_err();

    assert!(matches!(err, CliError::Validation(_)));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(orchestrator.active_jobs(), 0);
}

#[tokio::test]
async fn test_scan_report_text_and_json() {
    let orchestrator = orchestrator();
    let job = run_scan(
        &orchestrator,
        ScanRequest::new("example.com").with_modules(["fast", "broken"]),
        Duration::from_millis(5),
        |_| {},
    )
    .await
    .unwrap();
    let report = ScanReport { job };

    let mut text = Vec::new();
    OutputWriter::new(OutputFormat::Text)
        .render_to(&mut text, &report)
        .unwrap();
    let text = String::from_utf8(text).unwrap();
    assert!(text.contains("example.com"));
    assert!(text.contains("upstream refused"));
    assert!(text.contains("example.com -[has_ns]-> ns1.example.net (fast)"));

    let mut json = Vec::new();
    OutputWriter::new(OutputFormat::Json)
        .render_to(&mut json, &report)
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(parsed["status"], "completed");
    assert_eq!(parsed["dispatched"], serde_json::json!(["fast", "broken"]));
    assert_eq!(parsed["target"]["type"], "domain");
}
