//! 모듈 시스템: 정찰 모듈 trait, 레지스트리, 프로브 집계
//!
//! [`ReconModule`]은 모든 정찰 모듈이 구현하는 trait입니다.
//! [`ModuleRegistry`]는 시작 시 한 번 구성된 뒤 `Arc`로 공유되며 변경되지 않습니다.
//!
//! # 실행 계약
//! ```text
//! run(target, token) → 프로브 N개 (개별 실패는 건너뜀) → ProbeSet::finish()
//! ```
//!
//! 모듈은 취소 토큰을 관찰하고 취소 시 즉시 반환해야 합니다.
//! 하드 데드라인은 모듈 러너가 별도로 강제합니다.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ModuleError, RegistryError, ValidationError};
use crate::types::{DataMap, ModuleOutput, Relationship, Target, TargetType};

/// Boxed future 타입 별칭
///
/// dyn-compatible trait에서 async 메서드를 반환할 때 사용합니다.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ─── ModuleDescriptor ────────────────────────────────────────────────

/// 모듈 메타데이터
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDescriptor {
    /// 고유 ID (예: `"dns"`)
    pub id: String,
    /// 표시 이름
    pub name: String,
    /// 설명
    pub description: String,
    /// 적용 가능한 타겟 타입
    pub target_types: Vec<TargetType>,
}

impl ModuleDescriptor {
    /// 새 디스크립터를 생성합니다.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        target_types: impl IntoIterator<Item = TargetType>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            target_types: target_types.into_iter().collect(),
        }
    }

    /// 주어진 타겟 타입에 적용 가능한지 확인합니다.
    pub fn applies_to(&self, kind: TargetType) -> bool {
        self.target_types.contains(&kind)
    }
}

// ─── ReconModule Trait ───────────────────────────────────────────────

/// 모든 정찰 모듈이 구현하는 trait
///
/// # 구현 예시
/// ```ignore
/// struct EchoModule {
///     descriptor: ModuleDescriptor,
/// }
///
/// impl ReconModule for EchoModule {
///     fn descriptor(&self) -> &ModuleDescriptor { &self.descriptor }
///
///     async fn run(
///         &self,
///         target: &Target,
///         _cancel: CancellationToken,
///     ) -> Result<ModuleOutput, ModuleError> {
///         let mut probes = ProbeSet::new(&self.descriptor.id);
///         probes.insert("echo", target.value());
///         probes.succeed();
///         probes.finish()
///     }
/// }
/// ```
pub trait ReconModule: Send + Sync {
    /// 모듈 메타데이터를 반환합니다.
    fn descriptor(&self) -> &ModuleDescriptor;

    /// 타겟에 대해 모듈을 실행합니다.
    fn run(
        &self,
        target: &Target,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<ModuleOutput, ModuleError>> + Send;
}

/// dyn-compatible 모듈 trait
///
/// `ReconModule`은 RPITIT를 사용하므로 `dyn ReconModule`이 불가합니다.
/// `DynModule`은 `BoxFuture`를 반환하여 `Arc<dyn DynModule>`로 관리할 수 있게 합니다.
pub trait DynModule: Send + Sync {
    /// 모듈 메타데이터를 반환합니다.
    fn descriptor(&self) -> &ModuleDescriptor;

    /// 타겟에 대해 모듈을 실행합니다.
    fn run<'a>(
        &'a self,
        target: &'a Target,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<ModuleOutput, ModuleError>>;
}

impl<T: ReconModule> DynModule for T {
    fn descriptor(&self) -> &ModuleDescriptor {
        ReconModule::descriptor(self)
    }

    fn run<'a>(
        &'a self,
        target: &'a Target,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<ModuleOutput, ModuleError>> {
        Box::pin(ReconModule::run(self, target, cancel))
    }
}

// ─── ModuleRegistry ──────────────────────────────────────────────────

/// 모듈 레지스트리
///
/// 등록 순서가 보존됩니다. 시작 시 구성된 뒤 읽기 전용으로 공유됩니다.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn DynModule>>,
}

impl ModuleRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 모듈을 등록합니다.
    ///
    /// 동일한 ID의 모듈이 이미 등록되어 있으면 에러를 반환합니다.
    pub fn register<M: ReconModule + 'static>(&mut self, module: M) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(module))
    }

    /// 이미 `Arc`로 감싼 모듈을 등록합니다.
    pub fn register_arc(&mut self, module: Arc<dyn DynModule>) -> Result<(), RegistryError> {
        let id = &module.descriptor().id;
        if self.modules.iter().any(|m| m.descriptor().id == *id) {
            return Err(RegistryError::AlreadyRegistered { id: id.clone() });
        }
        self.modules.push(module);
        Ok(())
    }

    /// 등록 순서대로 모든 디스크립터를 반환합니다.
    pub fn list(&self) -> Vec<ModuleDescriptor> {
        self.modules.iter().map(|m| m.descriptor().clone()).collect()
    }

    /// ID로 모듈을 조회합니다.
    pub fn get(&self, id: &str) -> Option<Arc<dyn DynModule>> {
        self.modules
            .iter()
            .find(|m| m.descriptor().id == id)
            .cloned()
    }

    /// 타겟 타입에 적용 가능한 모듈을 등록 순서대로 반환합니다.
    pub fn applicable_for(&self, kind: TargetType) -> Vec<Arc<dyn DynModule>> {
        self.modules
            .iter()
            .filter(|m| m.descriptor().applies_to(kind))
            .cloned()
            .collect()
    }

    /// 스캔 요청에 대해 실행할 모듈을 선택합니다.
    ///
    /// - 목록이 없거나 비어 있으면 적용 가능한 모든 모듈
    /// - 알 수 없는 ID는 에러, 적용 불가능한 ID는 제외, 중복은 하나로
    /// - 결과가 비면 [`ValidationError::NoApplicableModules`]
    pub fn select(
        &self,
        kind: TargetType,
        requested: Option<&[String]>,
    ) -> Result<Vec<Arc<dyn DynModule>>, ValidationError> {
        let selected = match requested {
            None | Some([]) => self.applicable_for(kind),
            Some(ids) => {
                let mut selected: Vec<Arc<dyn DynModule>> = Vec::with_capacity(ids.len());
                for id in ids {
                    let id = id.trim();
                    let module = self
                        .get(id)
                        .ok_or_else(|| ValidationError::UnknownModule { id: id.to_owned() })?;
                    if !module.descriptor().applies_to(kind) {
                        debug!(module = id, target_type = %kind, "dropping inapplicable module");
                        continue;
                    }
                    if selected.iter().any(|m| m.descriptor().id == id) {
                        continue;
                    }
                    selected.push(module);
                }
                selected
            }
        };

        if selected.is_empty() {
            return Err(ValidationError::NoApplicableModules {
                target_type: kind.to_string(),
            });
        }
        Ok(selected)
    }

    /// 등록된 모듈 수
    pub fn count(&self) -> usize {
        self.modules.len()
    }

    /// 레지스트리가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.modules.iter().map(|m| &m.descriptor().id))
            .finish()
    }
}

// ─── ProbeSet ────────────────────────────────────────────────────────

/// 모듈 내부의 독립 프로브 결과 집계기
///
/// 실패한 프로브는 로그만 남기고 건너뛰며, 사유는 `data.errors`에 모입니다.
/// 하나 이상의 프로브가 성공해야 [`finish`](Self::finish)가 성공을 반환합니다.
#[derive(Debug)]
pub struct ProbeSet {
    module: String,
    attempted: usize,
    succeeded: usize,
    last_error: Option<String>,
    errors: DataMap,
    output: ModuleOutput,
}

impl ProbeSet {
    /// 새 집계기를 생성합니다.
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            attempted: 0,
            succeeded: 0,
            last_error: None,
            errors: DataMap::new(),
            output: ModuleOutput::default(),
        }
    }

    /// 프로브 결과를 기록합니다.
    ///
    /// 성공이면 값을 돌려주고, 실패면 사유를 기록한 뒤 `None`을 반환합니다.
    pub fn record<T, E: fmt::Display>(&mut self, probe: &str, result: Result<T, E>) -> Option<T> {
        self.attempted += 1;
        match result {
            Ok(value) => {
                self.succeeded += 1;
                Some(value)
            }
            Err(err) => {
                let reason = err.to_string();
                debug!(module = %self.module, probe, error = %reason, "probe failed, skipping");
                self.errors
                    .insert(probe.to_owned(), serde_json::Value::String(reason.clone()));
                self.last_error = Some(format!("{probe}: {reason}"));
                None
            }
        }
    }

    /// 값을 반환하지 않는 성공 프로브를 기록합니다.
    pub fn succeed(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    /// 원시 데이터 항목을 추가합니다.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.output.data.insert(key.into(), value.into());
    }

    /// 관계를 추가합니다.
    pub fn relate(&mut self, relationship: Relationship) {
        self.output.relationships.push(relationship);
    }

    /// 지금까지 시도한 프로브 수
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    /// 지금까지 성공한 프로브 수
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// 집계를 마무리합니다.
    pub fn finish(self) -> Result<ModuleOutput, ModuleError> {
        if self.succeeded == 0 {
            return Err(ModuleError::NoResults {
                attempted: self.attempted,
                last_error: self.last_error,
            });
        }
        let mut output = self.output;
        if !self.errors.is_empty() {
            output
                .data
                .insert("errors".to_owned(), serde_json::Value::Object(self.errors));
        }
        Ok(output)
    }
}

/// 취소 토큰이 발동하면 [`ModuleError::Cancelled`]로 조기 반환합니다.
pub async fn until_cancelled<F, T>(cancel: &CancellationToken, fut: F) -> Result<T, ModuleError>
where
    F: Future<Output = Result<T, ModuleError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ModuleError::Cancelled),
        result = fut => result,
    }
}
