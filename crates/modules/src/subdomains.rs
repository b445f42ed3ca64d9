//! `subdomains` 모듈: 인증서 투명성 검색과 DNS 브루트포스
//!
//! 두 프로브는 독립적입니다.
//!
//! - `crtsh`: crt.sh 인증서 로그에서 `*.domain` 이름 수집
//! - `bruteforce`: 설정된 접두어마다 `prefix.domain`의 A 레코드 질의

use std::collections::BTreeSet;
use std::sync::Arc;

use reconpost_core::target::is_valid_domain;
use reconpost_core::{
    CancellationToken, ModuleDescriptor, ModuleError, ModuleOutput, ProbeSet, ReconModule,
    Relationship, Target, TargetType, relation, until_cancelled,
};
use reqwest::Client;
use serde_json::{Value, json};
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::ProbeError;
use crate::http::get_json;
use crate::resolver::{Record, RecordKind, RecordLookup, clean_name};

pub const MODULE_ID: &str = "subdomains";

const CRTSH_BASE: &str = "https://crt.sh";

/// 브루트포스로 발견한 서브도메인
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Discovered {
    pub name: String,
    pub addresses: Vec<String>,
}

/// 서브도메인 열거 모듈
pub struct SubdomainsModule<L> {
    descriptor: ModuleDescriptor,
    client: Client,
    lookup: L,
    prefixes: Arc<[String]>,
    crtsh_base: String,
}

impl<L: RecordLookup> SubdomainsModule<L> {
    pub fn new(client: Client, lookup: L, prefixes: Vec<String>) -> Self {
        Self {
            descriptor: ModuleDescriptor::new(
                MODULE_ID,
                "Subdomain Enumeration",
                "Collects subdomains from certificate transparency logs and DNS brute force",
                [TargetType::Domain],
            ),
            client,
            lookup,
            prefixes: prefixes.into(),
            crtsh_base: CRTSH_BASE.to_owned(),
        }
    }

    /// crt.sh 엔드포인트를 교체합니다.
    pub fn with_crtsh_base(mut self, base: impl Into<String>) -> Self {
        self.crtsh_base = base.into().trim_end_matches('/').to_owned();
        self
    }

    async fn scan(&self, domain: &str) -> Result<ModuleOutput, ModuleError> {
        let mut probes = ProbeSet::new(MODULE_ID);
        let mut all = BTreeSet::new();

        if let Some(names) = probes.record("crtsh", self.crtsh(domain).await) {
            all.extend(names.iter().cloned());
            probes.insert("crtsh", json!(names));
        }

        if let Some(found) = probes.record("bruteforce", self.bruteforce(domain).await) {
            for item in &found {
                all.insert(item.name.clone());
                for addr in &item.addresses {
                    probes.relate(Relationship::new(
                        item.name.as_str(),
                        addr.as_str(),
                        relation::RESOLVES_TO,
                    ));
                }
            }
            let rows: Vec<Value> = found
                .iter()
                .map(|d| json!({"name": d.name, "addresses": d.addresses}))
                .collect();
            probes.insert("bruteforce", Value::Array(rows));
        }

        for name in &all {
            probes.relate(Relationship::new(domain, name.as_str(), relation::HAS_SUBDOMAIN));
        }
        probes.insert("subdomains", json!(all));
        probes.finish()
    }

    async fn crtsh(&self, domain: &str) -> Result<Vec<String>, ProbeError> {
        let query = format!("%.{domain}");
        let url = format!(
            "{}/?q={}&output=json",
            self.crtsh_base,
            urlencoding::encode(&query)
        );
        let body = get_json(&self.client, &url).await?;
        parse_crtsh(&body, domain)
    }

    /// 접두어별 A 질의를 동시에 수행합니다.
    ///
    /// 레코드 없음은 정상 응답이며, 모든 질의가 서버 오류면 프로브 실패입니다.
    async fn bruteforce(&self, domain: &str) -> Result<Vec<Discovered>, ProbeError> {
        let mut tasks = JoinSet::new();
        for prefix in self.prefixes.iter() {
            let name = format!("{prefix}.{domain}");
            let lookup = self.lookup.clone();
            tasks.spawn(async move {
                let result = lookup.lookup(&name, RecordKind::A).await;
                (name, result)
            });
        }

        let mut found = Vec::new();
        let mut answered = 0usize;
        let mut last_error = None;
        while let Some(joined) = tasks.join_next().await {
            let Ok((name, result)) = joined else {
                continue;
            };
            match result {
                Ok(records) => {
                    answered += 1;
                    let addresses = records
                        .iter()
                        .filter_map(|r| match r {
                            Record::A(ip) => Some(ip.to_string()),
                            _ => None,
                        })
                        .collect();
                    found.push(Discovered { name, addresses });
                }
                Err(ProbeError::NoRecords) => answered += 1,
                Err(err) => {
                    debug!(name, error = %err, "brute-force lookup failed");
                    last_error = Some(err);
                }
            }
        }

        if answered == 0 {
            if let Some(err) = last_error {
                return Err(err);
            }
        }
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }
}

/// crt.sh JSON 응답에서 도메인 하위 이름만 추출합니다.
///
/// `name_value`는 개행으로 구분된 여러 이름을 담을 수 있고 와일드카드 접두어를 가집니다.
pub(crate) fn parse_crtsh(body: &Value, domain: &str) -> Result<Vec<String>, ProbeError> {
    let entries = body
        .as_array()
        .ok_or_else(|| ProbeError::Decode("crt.sh response is not an array".to_owned()))?;
    let suffix = format!(".{domain}");
    let mut names = BTreeSet::new();
    for entry in entries {
        let Some(value) = entry.get("name_value").and_then(Value::as_str) else {
            continue;
        };
        for raw in value.lines() {
            let name = clean_name(raw.trim().trim_start_matches("*."));
            if name.ends_with(&suffix) && is_valid_domain(&name) {
                names.insert(name);
            }
        }
    }
    Ok(names.into_iter().collect())
}

impl<L: RecordLookup> ReconModule for SubdomainsModule<L> {
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
