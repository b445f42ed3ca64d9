//! `dns` 모듈: 도메인의 7가지 레코드 종류 질의
//!
//! 각 레코드 종류는 독립 프로브이며, 하나 이상 해석되면 성공입니다.
//! 종류별 질의는 동시에 실행되고 각각 [`DnsModule::with_kind_timeout`]으로 제한되므로,
//! 응답하지 않는 종류가 있어도 이미 해석된 레코드는 보존됩니다.
//!
//! | 레코드 | 관계 |
//! |---|---|
//! | A / AAAA | `resolves_to` |
//! | MX | `has_mx` (레이블 = 우선순위) |
//! | NS | `has_ns` |
//! | CNAME | `cname_to` |

use std::collections::HashMap;
use std::time::Duration;

use reconpost_core::{
    CancellationToken, ModuleDescriptor, ModuleError, ModuleOutput, ProbeSet, ReconModule,
    Relationship, Target, TargetType, relation, until_cancelled,
};
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::ProbeError;
use crate::resolver::{Record, RecordKind, RecordLookup};

pub const MODULE_ID: &str = "dns";

/// 레코드 종류별 기본 질의 제한 시간
pub const DEFAULT_KIND_TIMEOUT: Duration = Duration::from_secs(10);

/// DNS 레코드 모듈
pub struct DnsModule<L> {
    descriptor: ModuleDescriptor,
    lookup: L,
    kind_timeout: Duration,
}

impl<L: RecordLookup> DnsModule<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            descriptor: ModuleDescriptor::new(
                MODULE_ID,
                "DNS Records",
                "Resolves A, AAAA, MX, NS, TXT, CNAME and SOA records",
                [TargetType::Domain],
            ),
            lookup,
            kind_timeout: DEFAULT_KIND_TIMEOUT,
        }
    }

    /// 레코드 종류 하나의 질의 제한 시간을 지정합니다.
    pub fn with_kind_timeout(mut self, timeout: Duration) -> Self {
        self.kind_timeout = timeout;
        self
    }

    async fn scan(&self, domain: &str) -> Result<ModuleOutput, ModuleError> {
        let mut results = self.lookup_all(domain).await;

        // 결과는 완료 순서와 무관하게 RecordKind::ALL 순서로 접습니다.
        let mut probes = ProbeSet::new(MODULE_ID);
        for kind in RecordKind::ALL {
            let result = results
                .remove(&kind)
                .unwrap_or_else(|| Err(ProbeError::Task("lookup task did not finish".to_owned())));
            let Some(records) = probes.record(kind.as_str(), result) else {
                continue;
            };
            for rel in relationships(domain, &records) {
                probes.relate(rel);
            }
            probes.insert(
                kind.as_str(),
                Value::Array(records.iter().map(Record::to_json).collect()),
            );
        }
        probes.finish()
    }

    /// 모든 레코드 종류를 동시에 질의합니다.
    async fn lookup_all(
        &self,
        domain: &str,
    ) -> HashMap<RecordKind, Result<Vec<Record>, ProbeError>> {
        let mut tasks = JoinSet::new();
        for kind in RecordKind::ALL {
            let lookup = self.lookup.clone();
            let domain = domain.to_owned();
            let timeout = self.kind_timeout;
            tasks.spawn(async move {
                let result = match tokio::time::timeout(timeout, lookup.lookup(&domain, kind)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProbeError::Timeout {
                        ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    }),
                };
                (kind, result)
            });
        }

        let mut results = HashMap::with_capacity(RecordKind::ALL.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((kind, result)) => {
                    results.insert(kind, result);
                }
                Err(err) => debug!(module = MODULE_ID, error = %err, "lookup task failed"),
            }
        }
        results
    }
}

/// 레코드에서 관계를 도출합니다.
pub(crate) fn relationships(domain: &str, records: &[Record]) -> Vec<Relationship> {
    records
        .iter()
        .filter_map(|record| match record {
            Record::A(ip) => Some(Relationship::new(domain, ip.to_string(), relation::RESOLVES_TO)),
            Record::Aaaa(ip) => {
                Some(Relationship::new(domain, ip.to_string(), relation::RESOLVES_TO))
            }
            Record::Mx { priority, exchange } => Some(
                Relationship::new(domain, exchange.as_str(), relation::HAS_MX)
                    .with_label(priority.to_string()),
            ),
            Record::Ns(ns) => Some(Relationship::new(domain, ns.as_str(), relation::HAS_NS)),
            Record::Cname(cname) => {
                Some(Relationship::new(domain, cname.as_str(), relation::CNAME_TO))
            }
            Record::Txt(_) | Record::Soa { .. } => None,
        })
        .collect()
}

impl<L: RecordLookup> ReconModule for DnsModule<L> {
    fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    async fn run(
        &self,
        target: &Target,
        cancel: CancellationToken,
    ) -> Result<ModuleOutput, ModuleError> {
        until_cancelled(&cancel, self.scan(target.value())).await
    }
}
