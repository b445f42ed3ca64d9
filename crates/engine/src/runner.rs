//! 모듈 러너: 단일 모듈 실행을 `ModuleResult`로 변환
//!
//! 러너는 실패하지 않습니다. 모듈 에러, 패닉, 하드 데드라인 초과, 잡 취소가
//! 모두 `status: error`인 결과로 기록됩니다.
//!
//! 모듈은 별도 태스크에서 실행되므로 패닉이 오케스트레이터로 전파되지 않습니다.
//! 데드라인이나 취소가 먼저 도착하면 모듈의 자식 토큰을 취소하고 태스크를 중단합니다.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use reconpost_core::metrics as m;
use reconpost_core::{CancellationToken, DynModule, ModuleError, ModuleResult, Target};
use tokio::time::Instant;
use tracing::{Instrument, debug, warn};

/// 모듈을 실행하고 결과를 기록합니다.
///
/// `timeout`은 모듈 내부 타임아웃과 무관한 하드 데드라인입니다.
/// `cancel`은 잡 토큰이며 모듈에는 그 자식 토큰이 전달됩니다.
pub async fn execute(
    module: Arc<dyn DynModule>,
    target: &Target,
    timeout: Duration,
    cancel: &CancellationToken,
) -> ModuleResult {
    let descriptor = module.descriptor().clone();
    let module_token = cancel.child_token();
    let started = Instant::now();

    let task_target = target.clone();
    let task_token = module_token.clone();
    let mut handle =
        tokio::spawn(async move { module.run(&task_target, task_token).await }.in_current_span());

    let outcome = tokio::select! {
        biased;
        joined = &mut handle => match joined {
            Ok(result) => result,
            Err(err) if err.is_panic() => Err(ModuleError::Panicked(panic_message(err.into_panic()))),
            Err(_) => Err(ModuleError::Cancelled),
        },
        () = cancel.cancelled() => Err(ModuleError::Cancelled),
        () = tokio::time::sleep(timeout) => Err(ModuleError::Timeout),
    };

    if matches!(outcome, Err(ModuleError::Timeout | ModuleError::Cancelled)) {
        module_token.cancel();
        handle.abort();
    }

    let elapsed = started.elapsed();
    let result = match outcome {
        Ok(output) => {
            debug!(
                module = %descriptor.id,
                duration_ms = elapsed.as_millis() as u64,
                relationships = output.relationships.len(),
                "module succeeded"
            );
            ModuleResult::succeeded(&descriptor, output, elapsed)
        }
        Err(err) => {
            match &err {
                ModuleError::Panicked(_) => {
                    warn!(module = %descriptor.id, error = %err, "module task panicked");
                }
                _ => {
                    debug!(
                        module = %descriptor.id,
                        duration_ms = elapsed.as_millis() as u64,
                        error = %err,
                        "module failed"
                    );
                }
            }
            record_failure_kind(&descriptor.id, &err);
            ModuleResult::failed(&descriptor, &err, elapsed)
        }
    };

    if result.is_success() {
        metrics::counter!(
            m::MODULE_RUNS_TOTAL,
            m::LABEL_MODULE => descriptor.id.clone(),
            m::LABEL_RESULT => "success"
        )
        .increment(1);
    }
    metrics::histogram!(m::MODULE_DURATION_SECONDS, m::LABEL_MODULE => descriptor.id)
        .record(elapsed.as_secs_f64());

    result
}

fn record_failure_kind(module: &str, err: &ModuleError) {
    let kind = match err {
        ModuleError::Timeout => "timeout",
        ModuleError::Cancelled => "cancelled",
        ModuleError::Panicked(_) => "panicked",
        _ => "error",
    };
    metrics::counter!(
        m::MODULE_RUNS_TOTAL,
        m::LABEL_MODULE => module.to_owned(),
        m::LABEL_RESULT => kind
    )
    .increment(1);
}

/// 패닉 페이로드에서 메시지를 추출합니다.
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_owned(),
            Err(_) => "unknown panic payload".to_owned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use reconpost_core::{
        ModuleDescriptor, ModuleOutput, ModuleStatus, ProbeSet, ReconModule, TargetType, resolve,
    };

    use super::*;

    enum Behavior {
        Succeed,
        Fail,
        Sleep(Duration),
        Panic,
    }

    struct MockModule {
        descriptor: ModuleDescriptor,
        behavior: Behavior,
    }

    impl MockModule {
        fn new(behavior: Behavior) -> Arc<dyn DynModule> {
            Arc::new(Self {
                descriptor: ModuleDescriptor::new("mock", "Mock", "test module", [TargetType::Domain]),
                behavior,
            })
        }
    }

    impl ReconModule for MockModule {
        fn descriptor(&self) -> &ModuleDescriptor {
            &self.descriptor
        }

        async fn run(
            &self,
            target: &Target,
            _cancel: CancellationToken,
        ) -> Result<ModuleOutput, ModuleError> {
            match self.behavior {
                Behavior::Succeed => {
                    let mut probes = ProbeSet::new("mock");
                    probes.insert("echo", target.value());
                    probes.succeed();
                    probes.finish()
                }
                Behavior::Fail => Err(ModuleError::Probe("boom".to_owned())),
                Behavior::Sleep(d) => {
                    tokio::time::sleep(d).await;
                    Ok(ModuleOutput::default())
                }
                Behavior::Panic => panic!("module exploded"),
            }
        }
    }

    fn target() -> Target {
        resolve("example.com", None).unwrap()
    }

    #[tokio::test]
    async fn success_is_recorded_with_data() {
        let result = execute(
            MockModule::new(Behavior::Succeed),
            &target(),
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(result.status, ModuleStatus::Success);
        assert_eq!(result.data["echo"], "example.com");
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn module_error_message_is_recorded() {
        let result = execute(
            MockModule::new(Behavior::Fail),
            &target(),
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(result.status, ModuleStatus::Error);
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn hard_deadline_records_timeout() {
        let result = execute(
            MockModule::new(Behavior::Sleep(Duration::from_secs(3600))),
            &target(),
            Duration::from_secs(2),
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(result.status, ModuleStatus::Error);
        assert_eq!(result.error.as_deref(), Some("timeout"));
        assert!(result.duration_ms >= 2000);
    }

    #[tokio::test]
    async fn job_cancellation_records_cancelled() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let result = execute(
            MockModule::new(Behavior::Sleep(Duration::from_secs(3600))),
            &target(),
            Duration::from_secs(60),
            &cancel,
        )
        .await;
        assert_eq!(result.error.as_deref(), Some("cancelled"));
    }

    #[tokio::test]
    async fn panic_is_captured() {
        let result = execute(
            MockModule::new(Behavior::Panic),
            &target(),
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(result.status, ModuleStatus::Error);
        assert_eq!(result.error.as_deref(), Some("module panicked: module exploded"));
    }

    #[test]
    fn panic_message_handles_payload_types() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42u8)), "unknown panic payload");
    }
}
