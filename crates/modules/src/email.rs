//! `email` 모듈: 메일 도메인 MX, Gravatar 프로필, 일회용 도메인 여부
//!
//! 일회용 도메인 플래그는 참고 정보이며 프로브로 집계하지 않습니다.

use reconpost_core::{
    CancellationToken, ModuleDescriptor, ModuleError, ModuleOutput, ProbeSet, ReconModule,
    Relationship, Target, TargetType, relation, until_cancelled,
};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::dns;
use crate::error::ProbeError;
use crate::resolver::{RecordKind, RecordLookup};

pub const MODULE_ID: &str = "email";

const GRAVATAR_BASE: &str = "https://gravatar.com";

const DISPOSABLE_DOMAINS: &[&str] = &[
    "10minutemail.com",
    "dispostable.com",
    "fakeinbox.com",
    "getnada.com",
    "guerrillamail.com",
    "mailinator.com",
    "maildrop.cc",
    "mailnesia.com",
    "sharklasers.com",
    "temp-mail.org",
    "tempmail.com",
    "throwawaymail.com",
    "trashmail.com",
    "yopmail.com",
];

/// Gravatar 해시 (소문자화된 주소의 SHA-256 hex)
pub fn gravatar_hash(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    format!("{digest:x}")
}

/// 일회용 메일 서비스 도메인인지 확인합니다.
pub fn is_disposable(domain: &str) -> bool {
    DISPOSABLE_DOMAINS
        .iter()
        .any(|d| domain == *d || domain.ends_with(&format!(".{d}")))
}

/// Gravatar 프로필 응답 요약
pub(crate) fn parse_gravatar(body: &Value) -> Value {
    let entry = body.get("entry").and_then(|e| e.get(0));
    json!({
        "displayName": entry.and_then(|e| e.get("displayName")).cloned(),
        "profileUrl": entry.and_then(|e| e.get("profileUrl")).cloned(),
        "location": entry.and_then(|e| e.get("currentLocation")).cloned(),
    })
}

/// 이메일 주소 모듈
pub struct EmailModule<L> {
    descriptor: ModuleDescriptor,
    client: Client,
    lookup: L,
    gravatar_base: String,
}

impl<L: RecordLookup> EmailModule<L> {
    pub fn new(client: Client, lookup: L) -> Self {
        Self {
            descriptor: ModuleDescriptor::new(
                MODULE_ID,
                "Email Intelligence",
                "Checks mailbox domain MX records, Gravatar presence and disposable providers",
                [TargetType::Email],
            ),
            client,
            lookup,
            gravatar_base: GRAVATAR_BASE.to_owned(),
        }
    }

    /// Gravatar 엔드포인트를 교체합니다.
    pub fn with_gravatar_base(mut self, base: impl Into<String>) -> Self {
        self.gravatar_base = base.into().trim_end_matches('/').to_owned();
        self
    }

    /// 프로필이 있으면 `Some`, 404면 `None`
    async fn gravatar(&self, hash: &str) -> Result<Option<Value>, ProbeError> {
        let url = format!("{}/{hash}.json", self.gravatar_base);
        let resp = self.client.get(&url).send().await?;
        match resp.status() {
            StatusCode::OK => {
                let body: Value = resp
                    .json()
                    .await
                    .map_err(|e| ProbeError::Decode(e.to_string()))?;
                Ok(Some(parse_gravatar(&body)))
            }
            StatusCode::NOT_FOUND => Ok(None),
            other => Err(ProbeError::Status {
                status: other.as_u16(),
            }),
        }
    }

    async fn scan(&self, email: &str) -> Result<ModuleOutput, ModuleError> {
        let Some((_, domain)) = email.rsplit_once('@') else {
            return Err(ModuleError::Unsupported(format!("'{email}' is not an email address")));
        };

        let mut probes = ProbeSet::new(MODULE_ID);
        probes.relate(Relationship::new(email, domain, relation::USES_DOMAIN));
        probes.insert("domain", domain);
        probes.insert("disposable", is_disposable(domain));

        if let Some(records) = probes.record("mx", self.lookup.lookup(domain, RecordKind::Mx).await) {
            for rel in dns::relationships(domain, &records) {
                probes.relate(rel);
            }
            probes.insert(
                "mx",
                Value::Array(records.iter().map(|r| r.to_json()).collect()),
            );
        }

        let hash = gravatar_hash(email);
        if let Some(profile) = probes.record("gravatar", self.gravatar(&hash).await) {
            let url = format!("{GRAVATAR_BASE}/{hash}");
            let present = profile.is_some();
            if present {
                probes.relate(Relationship::new(email, url.as_str(), relation::HAS_PROFILE));
            }
            probes.insert(
                "gravatar",
                json!({
                    "hash": hash,
                    "present": present,
                    "url": url,
                    "profile": profile,
                }),
            );
        }
        probes.finish()
    }
}

impl<L: RecordLookup> ReconModule for EmailModule<L> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{Record, StaticLookup};

    #[test]
    fn gravatar_hash_normalizes_case_and_whitespace() {
        let a = gravatar_hash(" Alice@Example.com ");
        let b = gravatar_hash("alice@example.com");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    fn offline_module(lookup: StaticLookup) -> EmailModule<StaticLookup> {
        EmailModule::new(Client::new(), lookup).with_gravatar_base("http://127.0.0.1:9")
    }

    #[tokio::test]
    async fn mx_records_and_domain_edge_survive_gravatar_failure() {
        let lookup = StaticLookup::new().with(
            "example.com",
            Record::Mx {
                priority: 10,
                exchange: "mx1.example.com".to_owned(),
            },
        );
        let module = offline_module(lookup);
        let target = reconpost_core::resolve("alice@example.com", None).unwrap();
        let output = ReconModule::run(&module, &target, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.data["domain"], "example.com");
        assert_eq!(output.data["disposable"], false);
        assert!(output.data["errors"]["gravatar"].is_string());
        assert!(output.relationships.contains(&Relationship::new(
            "alice@example.com",
            "example.com",
            relation::USES_DOMAIN
        )));
        assert!(
            output
                .relationships
                .iter()
                .any(|r| r.kind == relation::HAS_MX && r.target == "mx1.example.com")
        );
    }

    #[tokio::test]
    async fn no_mx_and_no_gravatar_is_module_failure() {
        let module = offline_module(StaticLookup::new());
        let target = reconpost_core::resolve("bob@mailinator.com", None).unwrap();
        let err = ReconModule::run(&module, &target, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ModuleError::NoResults { attempted: 2, .. }));
    }

    #[test]
    fn disposable_domains_match_exact_and_subdomains() {
        assert!(is_disposable("mailinator.com"));
        assert!(is_disposable("eu.mailinator.com"));
        assert!(!is_disposable("notmailinator.com"));
        assert!(!is_disposable("example.com"));
    }

    #[test]
    fn gravatar_profile_summary() {
        let body = json!({"entry": [{"displayName": "Alice", "profileUrl": "https://gravatar.com/alice"}]});
        let summary = parse_gravatar(&body);
        assert_eq!(summary["displayName"], "Alice");
        assert!(summary["location"].is_null());
    }
}
