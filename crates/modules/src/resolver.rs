//! DNS 질의 추상화
//!
//! [`RecordLookup`]은 DNS 기반 모듈(`dns`, `subdomains`, `reverse_dns`, `email`)이
//! 공유하는 질의 인터페이스입니다. 운영 환경은 [`HickoryLookup`],
//! 오프라인 테스트는 [`StaticLookup`]을 사용합니다.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::rr::{Name, RData, RecordType};
use serde_json::{Value, json};

use crate::error::ProbeError;

// ─── RecordKind / Record ─────────────────────────────────────────────

/// 질의 대상 레코드 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    A,
    Aaaa,
    Mx,
    Ns,
    Txt,
    Cname,
    Soa,
}

impl RecordKind {
    /// `dns` 모듈의 질의 순서
    pub const ALL: [RecordKind; 7] = [
        Self::A,
        Self::Aaaa,
        Self::Mx,
        Self::Ns,
        Self::Txt,
        Self::Cname,
        Self::Soa,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Aaaa => "AAAA",
            Self::Mx => "MX",
            Self::Ns => "NS",
            Self::Txt => "TXT",
            Self::Cname => "CNAME",
            Self::Soa => "SOA",
        }
    }

    fn record_type(&self) -> RecordType {
        match self {
            Self::A => RecordType::A,
            Self::Aaaa => RecordType::AAAA,
            Self::Mx => RecordType::MX,
            Self::Ns => RecordType::NS,
            Self::Txt => RecordType::TXT,
            Self::Cname => RecordType::CNAME,
            Self::Soa => RecordType::SOA,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 해석된 DNS 레코드
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Mx { priority: u16, exchange: String },
    Ns(String),
    Txt(String),
    Cname(String),
    Soa { mname: String, rname: String, serial: u32 },
}

impl Record {
    /// 레코드 종류
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::A(_) => RecordKind::A,
            Self::Aaaa(_) => RecordKind::Aaaa,
            Self::Mx { .. } => RecordKind::Mx,
            Self::Ns(_) => RecordKind::Ns,
            Self::Txt(_) => RecordKind::Txt,
            Self::Cname(_) => RecordKind::Cname,
            Self::Soa { .. } => RecordKind::Soa,
        }
    }

    /// 원시 데이터 표현
    pub fn to_json(&self) -> Value {
        match self {
            Self::A(ip) => Value::String(ip.to_string()),
            Self::Aaaa(ip) => Value::String(ip.to_string()),
            Self::Mx { priority, exchange } => json!({"priority": priority, "exchange": exchange}),
            Self::Ns(name) | Self::Txt(name) | Self::Cname(name) => Value::String(name.clone()),
            Self::Soa {
                mname,
                rname,
                serial,
            } => json!({"mname": mname, "rname": rname, "serial": serial}),
        }
    }
}

// ─── RecordLookup Trait ──────────────────────────────────────────────

/// DNS 질의 인터페이스
///
/// 레코드가 없으면 [`ProbeError::NoRecords`]를 반환해야 합니다.
pub trait RecordLookup: Clone + Send + Sync + 'static {
    /// 정방향 질의
    fn lookup(
        &self,
        name: &str,
        kind: RecordKind,
    ) -> impl Future<Output = Result<Vec<Record>, ProbeError>> + Send;

    /// PTR 질의
    fn reverse(&self, ip: IpAddr) -> impl Future<Output = Result<Vec<String>, ProbeError>> + Send;
}

/// 호스트 이름 끝의 루트 점을 제거하고 소문자화합니다.
pub(crate) fn clean_name(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

// ─── HickoryLookup ───────────────────────────────────────────────────

/// hickory-resolver 기반 질의기
#[derive(Clone)]
pub struct HickoryLookup {
    resolver: TokioAsyncResolver,
}

impl HickoryLookup {
    /// 기본 업스트림 설정과 주어진 질의 타임아웃으로 생성합니다.
    pub fn new(timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 2;
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
        }
    }
}

impl fmt::Debug for HickoryLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HickoryLookup").finish_non_exhaustive()
    }
}

fn map_resolve_error(err: ResolveError) -> ProbeError {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => ProbeError::NoRecords,
        _ => ProbeError::Dns(err.to_string()),
    }
}

fn convert(rdata: &RData) -> Option<Record> {
    let record = match rdata {
        RData::A(a) => Record::A(a.0),
        RData::AAAA(aaaa) => Record::Aaaa(aaaa.0),
        RData::MX(mx) => Record::Mx {
            priority: mx.preference(),
            exchange: clean_name(&mx.exchange().to_utf8()),
        },
        RData::NS(ns) => Record::Ns(clean_name(&ns.0.to_utf8())),
        RData::TXT(txt) => Record::Txt(
            txt.txt_data()
                .iter()
                .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                .collect::<Vec<_>>()
                .join(""),
        ),
        RData::CNAME(cname) => Record::Cname(clean_name(&cname.0.to_utf8())),
        RData::SOA(soa) => Record::Soa {
            mname: clean_name(&soa.mname().to_utf8()),
            rname: clean_name(&soa.rname().to_utf8()),
            serial: soa.serial(),
        },
        _ => return None,
    };
    Some(record)
}

impl RecordLookup for HickoryLookup {
    async fn lookup(&self, name: &str, kind: RecordKind) -> Result<Vec<Record>, ProbeError> {
        let answer = self
            .resolver
            .lookup(name, kind.record_type())
            .await
            .map_err(map_resolve_error)?;
        // CNAME 체인이 함께 응답될 수 있으므로 질의한 종류만 남깁니다.
        let records: Vec<Record> = answer
            .iter()
            .filter_map(convert)
            .filter(|r| r.kind() == kind)
            .collect();
        if records.is_empty() {
            return Err(ProbeError::NoRecords);
        }
        Ok(records)
    }

    async fn reverse(&self, ip: IpAddr) -> Result<Vec<String>, ProbeError> {
        let answer = self
            .resolver
            .lookup(Name::from(ip), RecordType::PTR)
            .await
            .map_err(map_resolve_error)?;
        let names: Vec<String> = answer
            .iter()
            .filter_map(|rdata| match rdata {
                RData::PTR(ptr) => Some(clean_name(&ptr.0.to_utf8())),
                _ => None,
            })
            .collect();
        if names.is_empty() {
            return Err(ProbeError::NoRecords);
        }
        Ok(names)
    }
}

// ─── StaticLookup ────────────────────────────────────────────────────

/// 고정 레코드 테이블 질의기
///
/// 등록되지 않은 질의는 `NoRecords`, [`fail`](Self::fail)로 지정한 질의는
/// `Dns` 에러를 반환합니다.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    records: HashMap<(String, RecordKind), Vec<Record>>,
    failures: HashMap<(String, RecordKind), String>,
    ptr: HashMap<IpAddr, Vec<String>>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// 레코드를 추가합니다.
    pub fn with(mut self, name: &str, record: Record) -> Self {
        self.records
            .entry((clean_name(name), record.kind()))
            .or_default()
            .push(record);
        self
    }

    /// 지정한 질의가 서버 오류로 실패하도록 합니다.
    pub fn fail(mut self, name: &str, kind: RecordKind, reason: &str) -> Self {
        self.failures
            .insert((clean_name(name), kind), reason.to_owned());
        self
    }

    /// PTR 레코드를 추가합니다.
    pub fn with_ptr(mut self, ip: IpAddr, name: &str) -> Self {
        self.ptr.entry(ip).or_default().push(clean_name(name));
        self
    }
}

impl RecordLookup for StaticLookup {
    async fn lookup(&self, name: &str, kind: RecordKind) -> Result<Vec<Record>, ProbeError> {
        let key = (clean_name(name), kind);
        if let Some(reason) = self.failures.get(&key) {
            return Err(ProbeError::Dns(reason.clone()));
        }
        self.records
            .get(&key)
            .cloned()
            .ok_or(ProbeError::NoRecords)
    }

    async fn reverse(&self, ip: IpAddr) -> Result<Vec<String>, ProbeError> {
        self.ptr.get(&ip).cloned().ok_or(ProbeError::NoRecords)
    }
}
