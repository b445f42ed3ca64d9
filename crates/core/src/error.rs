//! 에러 타입: 도메인별 에러 정의
//!
//! # 전파 정책
//!
//! - [`ValidationError`]: 잡 생성 전에 호출자에게 반환됩니다.
//! - [`ModuleError`]: 해당 모듈의 `ModuleResult`에 기록되며 절대 전파되지 않습니다.
//! - [`JobError`]: 알 수 없거나 만료된 잡 조회 시 반환됩니다.

/// reconpost 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 입력 검증 에러
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// 모듈 실행 에러
    #[error("module error: {0}")]
    Module(#[from] ModuleError),

    /// 잡 조회/관리 에러
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// 모듈 레지스트리 에러
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 스캔 요청 검증 에러
///
/// 어떤 모듈도 실행되기 전에 발생합니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// 빈 타겟
    #[error("target must not be empty")]
    EmptyTarget,

    /// 명시된 타입과 입력 형태가 맞지 않음
    #[error("'{value}' is not a valid {expected}")]
    TypeMismatch { value: String, expected: String },

    /// 알 수 없는 타겟 타입
    #[error("unknown target type '{0}' (expected: domain, ip, email, username)")]
    UnknownTargetType(String),

    /// 레지스트리에 없는 모듈 ID
    #[error("unknown module: {id}")]
    UnknownModule { id: String },

    /// 타겟 타입에 적용 가능한 모듈이 없음
    #[error("no applicable modules for target type {target_type}")]
    NoApplicableModules { target_type: String },
}

/// 모듈 실행 에러
///
/// Display 문자열이 그대로 `ModuleResult.error`에 기록됩니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    /// 모듈 데드라인 초과
    #[error("timeout")]
    Timeout,

    /// 잡 취소
    #[error("cancelled")]
    Cancelled,

    /// 모듈 태스크 panic
    #[error("module panicked: {0}")]
    Panicked(String),

    /// 모든 개별 프로브 실패
    #[error("no probe succeeded ({attempted} attempted){}", error_suffix(.last_error))]
    NoResults {
        attempted: usize,
        last_error: Option<String>,
    },

    /// 단일 프로브 실패
    #[error("{0}")]
    Probe(String),

    /// 타겟을 처리할 수 없음
    #[error("unsupported target: {0}")]
    Unsupported(String),
}

fn error_suffix(last_error: &Option<String>) -> String {
    last_error
        .as_deref()
        .map(|e| format!(": {e}"))
        .unwrap_or_default()
}

/// 잡 관련 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    /// 알 수 없거나 만료된 잡
    #[error("scan not found: {id}")]
    NotFound { id: String },
}

/// 모듈 레지스트리 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// 동일한 ID의 모듈이 이미 등록됨
    #[error("module already registered: {id}")]
    AlreadyRegistered { id: String },
}
