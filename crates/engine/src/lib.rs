//! reconpost 스캔 엔진
//!
//! - [`runner`]: 단일 모듈 실행 (데드라인, 취소, 패닉 격리)
//! - [`store`]: 인메모리 잡 저장소와 만료 정리
//! - [`orchestrator`]: 잡 생성, 모듈 디스패치, 조회 API

pub mod orchestrator;
pub mod runner;
pub mod store;

pub use orchestrator::{ScanOrchestrator, ScanRequest};
pub use runner::execute;
pub use store::{JobGraph, JobStore, PurgeStats};
