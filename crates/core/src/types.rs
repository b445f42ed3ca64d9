//! 도메인 타입: 타겟, 관계, 모듈 결과, 잡
//!
//! 와이어 형식은 camelCase 필드명과 소문자 enum 값을 사용합니다.
//! 시각은 RFC 3339 UTC 문자열로 직렬화됩니다.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ModuleError, ValidationError};
use crate::module::ModuleDescriptor;

/// 모듈 원시 데이터 맵
pub type DataMap = serde_json::Map<String, serde_json::Value>;

// ─── TargetType ──────────────────────────────────────────────────────

/// 조사 대상 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    /// 도메인 이름
    Domain,
    /// IPv4/IPv6 주소
    Ip,
    /// 이메일 주소
    Email,
    /// 사용자명
    Username,
}

impl TargetType {
    /// 모든 타겟 타입 (추론 우선순위 순서 아님)
    pub const ALL: [TargetType; 4] = [Self::Domain, Self::Ip, Self::Email, Self::Username];

    /// 소문자 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Ip => "ip",
            Self::Email => "email",
            Self::Username => "username",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "domain" => Ok(Self::Domain),
            "ip" => Ok(Self::Ip),
            "email" => Ok(Self::Email),
            "username" => Ok(Self::Username),
            other => Err(ValidationError::UnknownTargetType(other.to_owned())),
        }
    }
}

// ─── Target ──────────────────────────────────────────────────────────

/// 정규화된 조사 대상
///
/// [`resolve`](crate::target::resolve)로만 생성되며 이후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Target {
    value: String,
    #[serde(rename = "type")]
    kind: TargetType,
}

impl Target {
    pub(crate) fn new(value: String, kind: TargetType) -> Self {
        Self { value, kind }
    }

    /// 정규화된 값
    pub fn value(&self) -> &str {
        &self.value
    }

    /// 타겟 타입
    pub fn kind(&self) -> TargetType {
        self.kind
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.value, self.kind)
    }
}

// ─── Relationship ────────────────────────────────────────────────────

/// 관계 타입 상수
pub mod relation {
    /// 도메인 → 주소
    pub const RESOLVES_TO: &str = "resolves_to";
    /// 도메인 → 메일 교환기
    pub const HAS_MX: &str = "has_mx";
    /// 도메인 → 네임서버
    pub const HAS_NS: &str = "has_ns";
    /// 별칭 → 정식 이름
    pub const CNAME_TO: &str = "cname_to";
    /// 도메인 → 서브도메인
    pub const HAS_SUBDOMAIN: &str = "has_subdomain";
    /// 도메인 → 등록 대행자
    pub const REGISTERED_WITH: &str = "registered_with";
    /// 주소 → 할당 네트워크
    pub const BELONGS_TO_NETWORK: &str = "belongs_to_network";
    /// 주소 → 위치
    pub const LOCATED_IN: &str = "located_in";
    /// 주소 → AS
    pub const ANNOUNCED_BY: &str = "announced_by";
    /// 호스트 → `host:port`
    pub const HAS_OPEN_PORT: &str = "has_open_port";
    /// 호스트 → 리다이렉트 대상 호스트
    pub const REDIRECTS_TO: &str = "redirects_to";
    /// 주소 → PTR 이름
    pub const HAS_PTR: &str = "has_ptr";
    /// 이메일 → 메일 도메인
    pub const USES_DOMAIN: &str = "uses_domain";
    /// 식별자 → 프로필 URL
    pub const HAS_PROFILE: &str = "has_profile";
}

/// 두 엔티티 값 사이의 방향성 있는 관계
///
/// 그 자체로는 유일하지 않으며, 유일성은 집계 시점에만 보장됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    /// 출발 엔티티
    pub source: String,
    /// 도착 엔티티
    pub target: String,
    /// 관계 타입 (예: `resolves_to`)
    #[serde(rename = "type")]
    pub kind: String,
    /// 부가 레이블 (예: MX 우선순위)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Relationship {
    /// 레이블 없는 관계를 생성합니다.
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind: kind.into(),
            label: None,
        }
    }

    /// 레이블을 붙입니다.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.source, self.kind, self.target)?;
        if let Some(label) = &self.label {
            write!(f, " ({label})")?;
        }
        Ok(())
    }
}

// ─── ModuleResult ────────────────────────────────────────────────────

/// 모듈 실행 결과 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    /// 하나 이상의 프로브 성공
    Success,
    /// 실패, 타임아웃 또는 취소
    Error,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// 모듈이 반환하는 원시 결과물
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleOutput {
    /// 원시 데이터
    pub data: DataMap,
    /// 도출된 관계
    pub relationships: Vec<Relationship>,
}

/// 잡 안의 모듈 하나에 대한 최종 결과
///
/// 잡당 모듈당 정확히 한 번 Module Runner가 생성하며 이후 읽기 전용입니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleResult {
    pub module_id: String,
    pub name: String,
    pub status: ModuleStatus,
    pub data: DataMap,
    pub relationships: Vec<Relationship>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModuleResult {
    /// 성공 결과를 생성합니다.
    pub fn succeeded(descriptor: &ModuleDescriptor, output: ModuleOutput, elapsed: Duration) -> Self {
        Self {
            module_id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            status: ModuleStatus::Success,
            data: output.data,
            relationships: output.relationships,
            duration_ms: duration_ms(elapsed),
            error: None,
        }
    }

    /// 실패 결과를 생성합니다.
    pub fn failed(descriptor: &ModuleDescriptor, err: &ModuleError, elapsed: Duration) -> Self {
        Self {
            module_id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            status: ModuleStatus::Error,
            data: DataMap::new(),
            relationships: Vec::new(),
            duration_ms: duration_ms(elapsed),
            error: Some(err.to_string()),
        }
    }

    /// 성공 여부
    pub fn is_success(&self) -> bool {
        self.status == ModuleStatus::Success
    }
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

// ─── Job ─────────────────────────────────────────────────────────────

/// 잡 상태
///
/// 상태 전환: `queued → running → {completed, error}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// 대기 중
    Queued,
    /// 실행 중
    Running,
    /// 모든 모듈 종료
    Completed,
    /// 오케스트레이터 내부 장애
    Error,
}

impl JobStatus {
    /// 종료 상태 여부
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => f.write_str("queued"),
            Self::Running => f.write_str("running"),
            Self::Completed => f.write_str("completed"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// 스캔 잡
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub target: Target,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// 디스패치된 모듈 ID (디스패치 순서)
    pub dispatched: Vec<String>,
    /// 완료 순서대로 누적되는 모듈 결과
    pub modules: Vec<ModuleResult>,
    /// 중복 제거된 관계 목록
    pub relationships: Vec<Relationship>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// 실행 중 상태의 새 잡을 생성합니다.
    pub fn start(id: impl Into<String>, target: Target, dispatched: Vec<String>) -> Self {
        Self {
            id: id.into(),
            target,
            status: JobStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            dispatched,
            modules: Vec::new(),
            relationships: Vec::new(),
            error: None,
        }
    }

    /// 아직 결과가 없는 디스패치 모듈 수
    pub fn pending(&self) -> usize {
        self.dispatched.len().saturating_sub(self.modules.len())
    }

    /// 실패한 모듈 수
    pub fn failed_modules(&self) -> usize {
        self.modules.iter().filter(|m| !m.is_success()).count()
    }
}
