//! `headers` 모듈: HTTP(S) 응답 헤더 수집과 보안 헤더 분석
//!
//! 리다이렉트를 따라가지 않고 `Location`을 직접 기록합니다.
//! 호스트가 바뀌는 리다이렉트는 `redirects_to` 관계가 됩니다.

use std::collections::BTreeMap;

use reconpost_core::{
    CancellationToken, ModuleDescriptor, ModuleError, ModuleOutput, ProbeSet, ReconModule,
    Relationship, Target, TargetType, relation, until_cancelled,
};
use reqwest::{Client, Url};
use serde_json::{Value, json};

use crate::error::ProbeError;
use crate::http::url_host;

pub const MODULE_ID: &str = "headers";

/// 점검 대상 보안 헤더와 감점
const SECURITY_HEADERS: [(&str, u8); 6] = [
    ("strict-transport-security", 20),
    ("content-security-policy", 20),
    ("x-frame-options", 15),
    ("x-content-type-options", 15),
    ("referrer-policy", 15),
    ("permissions-policy", 15),
];

/// 단일 스킴 응답 요약
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Fetched {
    pub url: String,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub location: Option<String>,
}

impl Fetched {
    fn to_json(&self) -> Value {
        json!({
            "url": self.url,
            "status": self.status,
            "headers": self.headers,
            "location": self.location,
        })
    }
}

/// HTTP 헤더 모듈
pub struct HeadersModule {
    descriptor: ModuleDescriptor,
    client: Client,
}

impl HeadersModule {
    /// `client`는 리다이렉트를 따라가지 않아야 합니다.
    pub fn new(client: Client) -> Self {
        Self {
            descriptor: ModuleDescriptor::new(
                MODULE_ID,
                "HTTP Headers",
                "Fetches HTTPS and HTTP responses and grades security headers",
                [TargetType::Domain, TargetType::Ip],
            ),
            client,
        }
    }

    async fn fetch(&self, url: &str) -> Result<Fetched, ProbeError> {
        let resp = self.client.get(url).send().await?;
        let headers: BTreeMap<String, String> = resp
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let status = resp.status();
        let location = if status.is_redirection() {
            headers.get("location").cloned()
        } else {
            None
        };
        Ok(Fetched {
            url: url.to_owned(),
            status: status.as_u16(),
            headers,
            location,
        })
    }

    async fn scan(&self, host: &str) -> Result<ModuleOutput, ModuleError> {
        let mut probes = ProbeSet::new(MODULE_ID);
        let mut analyzed = false;

        for scheme in ["https", "http"] {
            let url = format!("{scheme}://{}/", url_host(host));
            let Some(fetched) = probes.record(scheme, self.fetch(&url).await) else {
                continue;
            };
            if let Some(next) = fetched
                .location
                .as_deref()
                .and_then(|loc| redirect_host(&url, loc))
                .filter(|next| !next.eq_ignore_ascii_case(host))
            {
                probes.relate(Relationship::new(host, next, relation::REDIRECTS_TO));
            }
            // HTTPS 응답이 있으면 그것을 기준으로 분석합니다.
            if !analyzed {
                probes.insert("security", analyze(&fetched.headers));
                analyzed = true;
            }
            probes.insert(scheme, fetched.to_json());
        }
        probes.finish()
    }
}

/// `Location` 값을 요청 URL 기준으로 해석해 호스트를 반환합니다.
pub(crate) fn redirect_host(base: &str, location: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    let next = base.join(location).ok()?;
    next.host_str()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_ascii_lowercase())
}

/// 보안 헤더 점수를 계산합니다 (100점 만점, 누락 시 감점).
pub(crate) fn analyze(headers: &BTreeMap<String, String>) -> Value {
    let mut score: u8 = 100;
    let mut present = Vec::new();
    let mut missing = Vec::new();
    for (name, penalty) in SECURITY_HEADERS {
        let found = headers.contains_key(name)
            || (name == "permissions-policy" && headers.contains_key("feature-policy"));
        if found {
            present.push(name);
        } else {
            missing.push(name);
            score = score.saturating_sub(penalty);
        }
    }

    let mut findings = Vec::new();
    if let Some(server) = headers.get("server") {
        if server.contains('/') {
            findings.push(format!("server header discloses version: {server}"));
        }
    }
    if let Some(powered) = headers.get("x-powered-by") {
        findings.push(format!("x-powered-by discloses technology: {powered}"));
    }

    json!({
        "score": score,
        "present": present,
        "missing": missing,
        "findings": findings,
    })
}

impl ReconModule for HeadersModule {
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
