//! 프로브 에러 타입
//!
//! [`ProbeError`]는 개별 프로브(DNS 질의, HTTP 요청, TCP 연결) 실패를 나타냅니다.
//! `From<ProbeError> for ModuleError` 구현으로 모듈 경계에서 core 에러로 변환됩니다.

use reconpost_core::error::ModuleError;

/// 개별 프로브 실패
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// DNS 질의 실패 (서버 오류, 타임아웃 등)
    #[error("dns lookup failed: {0}")]
    Dns(String),

    /// 질의는 성공했으나 레코드가 없음
    #[error("no records found")]
    NoRecords,

    /// HTTP 요청 실패
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// 예상하지 못한 HTTP 상태 코드
    #[error("unexpected HTTP status {status}")]
    Status { status: u16 },

    /// 응답 본문 해석 실패
    #[error("invalid response: {0}")]
    Decode(String),

    /// TCP 연결 실패
    #[error("connect failed: {0}")]
    Connect(String),

    /// 프로브 타임아웃
    #[error("timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// 프로브 태스크가 결과 없이 종료됨
    #[error("task failed: {0}")]
    Task(String),

    /// 외부 서비스가 요청을 거절함
    #[error("rejected: {0}")]
    Rejected(String),
}

impl From<ProbeError> for ModuleError {
    fn from(err: ProbeError) -> Self {
        ModuleError::Probe(err.to_string())
    }
}
