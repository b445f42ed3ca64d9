//! HTTP API tests.
//!
//! Drives the axum router in-process with `tower::ServiceExt::oneshot`
//! against an orchestrator backed by mock modules.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use reconpost_core::config::ScanConfig;
use reconpost_core::{
    CancellationToken, ModuleDescriptor, ModuleError, ModuleOutput, ModuleRegistry, ReconModule,
    Relationship, Target, TargetType, relation,
};
use reconpost_daemon::api::{AppState, router};
use reconpost_engine::ScanOrchestrator;

/// Resolves every domain to a fixed address.
struct FixedDns {
    descriptor: ModuleDescriptor,
}

impl ReconModule for FixedDns {
    fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    async fn run(
        &self,
        target: &Target,
        _cancel: CancellationToken,
    ) -> Result<ModuleOutput, ModuleError> {
        Ok(ModuleOutput {
            relationships: vec![Relationship::new(
                target.value(),
                "192.0.2.10",
                relation::RESOLVES_TO,
            )],
            ..ModuleOutput::default()
        })
    }
}

/// Waits until cancelled.
struct Stalled {
    descriptor: ModuleDescriptor,
}

impl ReconModule for Stalled {
    fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    async fn run(
        &self,
        _target: &Target,
        cancel: CancellationToken,
    ) -> Result<ModuleOutput, ModuleError> {
        cancel.cancelled().await;
        Err(ModuleError::Cancelled)
    }
}

fn app() -> Router {
    let mut registry = ModuleRegistry::new();
    registry
        .register(FixedDns {
            descriptor: ModuleDescriptor::new("dns", "DNS", "fixed", [TargetType::Domain]),
        })
        .unwrap();
    registry
        .register(Stalled {
            descriptor: ModuleDescriptor::new(
                "stalled",
                "Stalled",
                "never finishes",
                [TargetType::Username],
            ),
        })
        .unwrap();
    let orchestrator = ScanOrchestrator::new(Arc::new(registry), ScanConfig::default());
    router(AppState::new(orchestrator))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn wait_completed(app: &Router, id: &str) -> Value {
    for _ in 0..200 {
        let (status, job) = send(app, Method::GET, &format!("/api/osint/scan/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        if job["status"] == "completed" {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("scan {id} did not complete");
}

#[tokio::test]
async fn lists_modules_in_registration_order() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/osint/modules", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modules"][0]["id"], "dns");
    assert_eq!(body["modules"][0]["targetTypes"], json!(["domain"]));
    assert_eq!(body["modules"][1]["id"], "stalled");
}

#[tokio::test]
async fn scan_lifecycle_create_poll_graph() {
    let app = app();
    let (status, job) = send(
        &app,
        Method::POST,
        "/api/osint/scan",
        Some(json!({"target": "HTTPS://Example.com/login"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["status"], "running");
    assert_eq!(job["target"], json!({"value": "example.com", "type": "domain"}));
    assert_eq!(job["modules"], json!([]));
    assert!(job.get("completedAt").is_none());

    let id = job["id"].as_str().unwrap().to_owned();
    let done = wait_completed(&app, &id).await;
    assert_eq!(done["modules"][0]["moduleId"], "dns");
    assert_eq!(done["modules"][0]["status"], "success");
    assert!(done["modules"][0]["durationMs"].is_u64());
    assert_eq!(
        done["relationships"],
        json!([{"source": "example.com", "target": "192.0.2.10", "type": "resolves_to"}])
    );
    assert!(done["completedAt"].is_string());

    let (status, graph) =
        send(&app, Method::GET, &format!("/api/osint/scan/{id}/graph"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graph["nodes"], json!([{"id": "example.com"}, {"id": "192.0.2.10"}]));
    assert_eq!(graph["edges"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn validation_errors_render_envelope() {
    let app = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/osint/scan",
        Some(json!({"target": "example.com", "type": "url"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["status"], 400);
    assert!(body["error"]["message"].as_str().unwrap().contains("url"));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/osint/scan",
        Some(json!({"target": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "target must not be empty");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/osint/scan",
        Some(json!({"target": "8.8.8.8"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "no module applies to ip");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/osint/scan",
        Some(json!({"target": "example.com", "modules": ["nope"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["status"], 400);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/osint/scan")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_scan_is_404() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/osint/scan/does-not-exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({"error": {"message": "scan not found: does-not-exist", "status": 404}})
    );

    let (status, _) = send(&app, Method::DELETE, "/api/osint/scan/does-not-exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, "/api/nothing-here", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_cancels_and_removes_scan() {
    let app = app();
    let (_, job) = send(
        &app,
        Method::POST,
        "/api/osint/scan",
        Some(json!({"target": "@octocat"})),
    )
    .await;
    assert_eq!(job["target"]["type"], "username");
    let id = job["id"].as_str().unwrap().to_owned();

    let (status, body) = send(&app, Method::DELETE, &format!("/api/osint/scan/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = send(&app, Method::GET, &format!("/api/osint/scan/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_jobs_and_modules() {
    let app = app();
    send(
        &app,
        Method::POST,
        "/api/osint/scan",
        Some(json!({"target": "someone", "type": "username"})),
    )
    .await;

    let (status, health) = send(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["registeredModules"], 2);
    assert_eq!(health["activeJobs"], 1);
    assert!(health["uptimeSecs"].is_u64());
}
