//! reconpost 공통 크레이트
//!
//! 타겟 해석, 모듈 계약, 관계 그래프, 에러, 설정, 메트릭 상수를 제공합니다.
//! 모든 reconpost 크레이트가 이 크레이트에 의존합니다.

pub mod config;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod module;
pub mod target;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{
    ConfigError, JobError, ModuleError, ReconError, RegistryError, ValidationError,
};

// 설정
pub use config::ReconpostConfig;

// 모듈 계약
pub use module::{
    BoxFuture, DynModule, ModuleDescriptor, ModuleRegistry, ProbeSet, ReconModule,
    until_cancelled,
};

// 그래프
pub use graph::{GraphNode, RelationshipGraph};

// 타겟 해석
pub use target::resolve;

// 도메인 타입
pub use types::{
    DataMap, Job, JobStatus, ModuleOutput, ModuleResult, ModuleStatus, Relationship, Target,
    TargetType, relation,
};

// 모듈 구현체용
pub use tokio_util::sync::CancellationToken;
