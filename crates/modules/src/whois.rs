//! `whois` 모듈: RDAP 등록 정보 조회 (rdap.org 부트스트랩)
//!
//! 도메인은 등록 대행자, 상태, 이벤트, 네임서버를, IP는 할당 네트워크를 반환합니다.

use reconpost_core::{
    CancellationToken, ModuleDescriptor, ModuleError, ModuleOutput, ProbeSet, ReconModule,
    Relationship, Target, TargetType, relation, until_cancelled,
};
use reqwest::Client;
use serde_json::{Map, Value, json};

use crate::http::get_json;
use crate::resolver::clean_name;

pub const MODULE_ID: &str = "whois";

const RDAP_BASE: &str = "https://rdap.org";

/// RDAP 등록 정보 모듈
pub struct WhoisModule {
    descriptor: ModuleDescriptor,
    client: Client,
    base_url: String,
}

impl WhoisModule {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, RDAP_BASE)
    }

    /// RDAP 엔드포인트를 지정해 생성합니다.
    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            descriptor: ModuleDescriptor::new(
                MODULE_ID,
                "WHOIS / RDAP",
                "Looks up registration data for domains and network allocation for IPs",
                [TargetType::Domain, TargetType::Ip],
            ),
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    async fn scan(&self, target: &Target) -> Result<ModuleOutput, ModuleError> {
        let mut probes = ProbeSet::new(MODULE_ID);
        match target.kind() {
            TargetType::Domain => {
                let url = format!("{}/domain/{}", self.base_url, target.value());
                if let Some(body) = probes.record("rdap", get_json(&self.client, &url).await) {
                    let info = parse_domain(&body);
                    for rel in info.relationships(target.value()) {
                        probes.relate(rel);
                    }
                    probes.insert("rdap", info.to_json());
                }
            }
            TargetType::Ip => {
                let url = format!("{}/ip/{}", self.base_url, target.value());
                if let Some(body) = probes.record("rdap", get_json(&self.client, &url).await) {
                    let info = parse_network(&body);
                    if let Some(network) = info.label() {
                        probes.relate(Relationship::new(
                            target.value(),
                            network,
                            relation::BELONGS_TO_NETWORK,
                        ));
                    }
                    probes.insert("rdap", info.to_json());
                }
            }
            other => {
                return Err(ModuleError::Unsupported(format!(
                    "whois does not handle {other} targets"
                )));
            }
        }
        probes.finish()
    }
}

impl ReconModule for WhoisModule {
    fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    async fn run(
        &self,
        target: &Target,
        cancel: CancellationToken,
    ) -> Result<ModuleOutput, ModuleError> {
        until_cancelled(&cancel, self.scan(target)).await
    }
}

// ─── RDAP 응답 해석 ──────────────────────────────────────────────────

/// 도메인 RDAP 요약
#[derive(Debug, Default, PartialEq)]
pub(crate) struct DomainRdap {
    pub handle: Option<String>,
    pub registrar: Option<String>,
    pub status: Vec<String>,
    pub events: Map<String, Value>,
    pub nameservers: Vec<String>,
}

impl DomainRdap {
    fn relationships(&self, domain: &str) -> Vec<Relationship> {
        let mut rels = Vec::new();
        if let Some(registrar) = &self.registrar {
            rels.push(Relationship::new(
                domain,
                registrar.as_str(),
                relation::REGISTERED_WITH,
            ));
        }
        for ns in &self.nameservers {
            rels.push(Relationship::new(domain, ns.as_str(), relation::HAS_NS));
        }
        rels
    }

    fn to_json(&self) -> Value {
        json!({
            "handle": self.handle,
            "registrar": self.registrar,
            "status": self.status,
            "events": self.events,
            "nameservers": self.nameservers,
        })
    }
}

/// IP 네트워크 RDAP 요약
#[derive(Debug, Default, PartialEq)]
pub(crate) struct NetworkRdap {
    pub handle: Option<String>,
    pub name: Option<String>,
    pub start_address: Option<String>,
    pub end_address: Option<String>,
    pub country: Option<String>,
    pub cidr: Option<String>,
}

impl NetworkRdap {
    /// 관계 도착점으로 쓸 네트워크 식별자 (이름 → CIDR → 핸들)
    fn label(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.cidr.as_deref())
            .or(self.handle.as_deref())
    }

    fn to_json(&self) -> Value {
        json!({
            "handle": self.handle,
            "name": self.name,
            "startAddress": self.start_address,
            "endAddress": self.end_address,
            "country": self.country,
            "cidr": self.cidr,
        })
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .filter(|s| !s.is_empty())
}

/// vCard 배열에서 `fn` 항목을 꺼냅니다.
fn vcard_name(entity: &Value) -> Option<String> {
    entity
        .get("vcardArray")?
        .get(1)?
        .as_array()?
        .iter()
        .find(|prop| prop.get(0).and_then(Value::as_str) == Some("fn"))
        .and_then(|prop| prop.get(3))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn has_role(entity: &Value, role: &str) -> bool {
    entity
        .get("roles")
        .and_then(Value::as_array)
        .is_some_and(|roles| roles.iter().any(|r| r.as_str() == Some(role)))
}

pub(crate) fn parse_domain(body: &Value) -> DomainRdap {
    let registrar = body
        .get("entities")
        .and_then(Value::as_array)
        .and_then(|entities| entities.iter().find(|e| has_role(e, "registrar")))
        .and_then(|e| vcard_name(e).or_else(|| str_field(e, "handle")));

    let status = body
        .get("status")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    let mut events = Map::new();
    if let Some(items) = body.get("events").and_then(Value::as_array) {
        for event in items {
            if let (Some(action), Some(date)) = (
                event.get("eventAction").and_then(Value::as_str),
                event.get("eventDate").and_then(Value::as_str),
            ) {
                events.insert(action.to_owned(), Value::String(date.to_owned()));
            }
        }
    }

    let nameservers = body
        .get("nameservers")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|ns| ns.get("ldhName").and_then(Value::as_str))
                .map(clean_name)
                .collect()
        })
        .unwrap_or_default();

    DomainRdap {
        handle: str_field(body, "handle"),
        registrar,
        status,
        events,
        nameservers,
    }
}

pub(crate) fn parse_network(body: &Value) -> NetworkRdap {
    let cidr = body
        .get("cidr0_cidrs")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|c| {
            let prefix = c
                .get("v4prefix")
                .or_else(|| c.get("v6prefix"))
                .and_then(Value::as_str)?;
            let length = c.get("length").and_then(Value::as_u64)?;
            Some(format!("{prefix}/{length}"))
        });

    NetworkRdap {
        handle: str_field(body, "handle"),
        name: str_field(body, "name"),
        start_address: str_field(body, "startAddress"),
        end_address: str_field(body, "endAddress"),
        country: str_field(body, "country"),
        cidr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN_FIXTURE: &str = r#"{
        "objectClassName": "domain",
        "handle": "2336799_DOMAIN_COM-VRSN",
        "ldhName": "EXAMPLE.COM",
        "status": ["client delete prohibited", "client transfer prohibited"],
        "events": [
            {"eventAction": "registration", "eventDate": "1995-08-14T04:00:00Z"},
            {"eventAction": "expiration", "eventDate": "2026-08-13T04:00:00Z"}
        ],
        "entities": [
            {"roles": ["technical"], "handle": "TECH"},
            {
                "roles": ["registrar"],
                "handle": "376",
                "vcardArray": ["vcard", [["version", {}, "text", "4.0"], ["fn", {}, "text", "RESERVED-Internet Assigned Numbers Authority"]]]
            }
        ],
        "nameservers": [
            {"objectClassName": "nameserver", "ldhName": "A.IANA-SERVERS.NET"},
            {"objectClassName": "nameserver", "ldhName": "B.IANA-SERVERS.NET"}
        ]
    }"#;

    const NETWORK_FIXTURE: &str = r#"{
        "objectClassName": "ip network",
        "handle": "NET-8-8-8-0-2",
        "startAddress": "8.8.8.0",
        "endAddress": "8.8.8.255",
        "name": "GOGL",
        "country": "US",
        "cidr0_cidrs": [{"v4prefix": "8.8.8.0", "length": 24}]
    }"#;

    #[test]
    fn parses_domain_registration() {
        let body: Value = serde_json::from_str(DOMAIN_FIXTURE).unwrap();
        let info = parse_domain(&body);
        assert_eq!(
            info.registrar.as_deref(),
            Some("RESERVED-Internet Assigned Numbers Authority")
        );
        assert_eq!(info.nameservers, ["a.iana-servers.net", "b.iana-servers.net"]);
        assert_eq!(info.events["registration"], "1995-08-14T04:00:00Z");
        assert_eq!(info.status.len(), 2);

        let rels = info.relationships("example.com");
        assert_eq!(rels[0].kind, relation::REGISTERED_WITH);
        assert_eq!(rels[1], Relationship::new("example.com", "a.iana-servers.net", relation::HAS_NS));
    }

    #[test]
    fn registrar_falls_back_to_handle() {
        let body = json!({"entities": [{"roles": ["registrar"], "handle": "292"}]});
        assert_eq!(parse_domain(&body).registrar.as_deref(), Some("292"));
    }

    #[test]
    fn parses_network_allocation() {
        let body: Value = serde_json::from_str(NETWORK_FIXTURE).unwrap();
        let info = parse_network(&body);
        assert_eq!(info.cidr.as_deref(), Some("8.8.8.0/24"));
        assert_eq!(info.label(), Some("GOGL"));
        assert_eq!(info.to_json()["startAddress"], "8.8.8.0");
    }

    #[test]
    fn empty_body_yields_empty_summary() {
        assert_eq!(parse_domain(&json!({})), DomainRdap::default());
        assert_eq!(parse_network(&json!({})).label(), None);
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn live_rdap_lookup() {
        let client = crate::http::build_client(&Default::default()).unwrap();
        let module = WhoisModule::new(client);
        let target = reconpost_core::resolve("example.com", None).unwrap();
        let output = ReconModule::run(&module, &target, CancellationToken::new())
            .await
            .unwrap();
        assert!(output.data.contains_key("rdap"));
    }
}
