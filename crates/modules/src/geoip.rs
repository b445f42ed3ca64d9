//! `geoip` 모듈: IP 위치와 AS 정보 (ip-api.com, ipwho.is)
//!
//! 사설/예약 주소는 네트워크 요청 없이 거절합니다.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use reconpost_core::{
    CancellationToken, ModuleDescriptor, ModuleError, ModuleOutput, ProbeSet, ReconModule,
    Relationship, Target, TargetType, relation, until_cancelled,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ProbeError;
use crate::http::get_json;

pub const MODULE_ID: &str = "geoip";

const IP_API_FIELDS: &str = "status,message,country,countryCode,regionName,city,lat,lon,isp,org,as,query";

/// 공급자 공통 위치 요약
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct GeoInfo {
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub asn: Option<String>,
    pub org: Option<String>,
    pub isp: Option<String>,
}

impl GeoInfo {
    fn to_json(&self) -> Value {
        json!({
            "country": self.country,
            "countryCode": self.country_code,
            "region": self.region,
            "city": self.city,
            "latitude": self.latitude,
            "longitude": self.longitude,
            "asn": self.asn,
            "org": self.org,
            "isp": self.isp,
        })
    }

    fn relationships(&self, ip: &str) -> Vec<Relationship> {
        let mut rels = Vec::new();
        if let Some(country) = &self.country {
            let mut rel = Relationship::new(ip, country.as_str(), relation::LOCATED_IN);
            if let Some(city) = &self.city {
                rel = rel.with_label(city.as_str());
            }
            rels.push(rel);
        }
        if let Some(asn) = &self.asn {
            let mut rel = Relationship::new(ip, asn.as_str(), relation::ANNOUNCED_BY);
            if let Some(org) = self.org.as_ref().or(self.isp.as_ref()) {
                rel = rel.with_label(org.as_str());
            }
            rels.push(rel);
        }
        rels
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpApiResponse {
    status: String,
    message: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
    region_name: Option<String>,
    city: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    isp: Option<String>,
    org: Option<String>,
    #[serde(rename = "as")]
    autonomous_system: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpWhoConnection {
    asn: Option<u64>,
    org: Option<String>,
    isp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpWhoResponse {
    success: bool,
    message: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
    region: Option<String>,
    city: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    connection: Option<IpWhoConnection>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

pub(crate) fn parse_ip_api(body: Value) -> Result<GeoInfo, ProbeError> {
    let resp: IpApiResponse =
        serde_json::from_value(body).map_err(|e| ProbeError::Decode(e.to_string()))?;
    if resp.status != "success" {
        return Err(ProbeError::Rejected(
            resp.message.unwrap_or_else(|| resp.status.clone()),
        ));
    }
    // "AS15169 Google LLC" → "AS15169"
    let asn = resp
        .autonomous_system
        .as_deref()
        .and_then(|s| s.split_whitespace().next())
        .filter(|s| s.starts_with("AS"))
        .map(str::to_owned);
    Ok(GeoInfo {
        country: non_empty(resp.country),
        country_code: non_empty(resp.country_code),
        region: non_empty(resp.region_name),
        city: non_empty(resp.city),
        latitude: resp.lat,
        longitude: resp.lon,
        asn,
        org: non_empty(resp.org),
        isp: non_empty(resp.isp),
    })
}

pub(crate) fn parse_ipwho(body: Value) -> Result<GeoInfo, ProbeError> {
    let resp: IpWhoResponse =
        serde_json::from_value(body).map_err(|e| ProbeError::Decode(e.to_string()))?;
    if !resp.success {
        return Err(ProbeError::Rejected(
            resp.message.unwrap_or_else(|| "lookup unsuccessful".to_owned()),
        ));
    }
    let (asn, org, isp) = match resp.connection {
        Some(conn) => (
            conn.asn.map(|n| format!("AS{n}")),
            non_empty(conn.org),
            non_empty(conn.isp),
        ),
        None => (None, None, None),
    };
    Ok(GeoInfo {
        country: non_empty(resp.country),
        country_code: non_empty(resp.country_code),
        region: non_empty(resp.region),
        city: non_empty(resp.city),
        latitude: resp.latitude,
        longitude: resp.longitude,
        asn,
        org,
        isp,
    })
}

/// 공인 인터넷에서 라우팅 가능한 주소인지 판정합니다.
pub fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(v4),
            None => is_public_v6(v6),
        },
    }
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    !(ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
        // 100.64.0.0/10 (CGNAT)
        || (a == 100 && (64..128).contains(&b))
        // 240.0.0.0/4 (reserved)
        || a >= 240
        || a == 0)
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    !(ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // fc00::/7 (ULA)
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 (link-local)
        || (first & 0xffc0) == 0xfe80
        // 2001:db8::/32 (documentation)
        || (first == 0x2001 && ip.segments()[1] == 0x0db8))
}

/// GeoIP 모듈
pub struct GeoIpModule {
    descriptor: ModuleDescriptor,
    client: Client,
}

impl GeoIpModule {
    pub fn new(client: Client) -> Self {
        Self {
            descriptor: ModuleDescriptor::new(
                MODULE_ID,
                "GeoIP",
                "Locates an IP address and its announcing autonomous system",
                [TargetType::Ip],
            ),
            client,
        }
    }

    async fn ip_api(&self, ip: &str) -> Result<GeoInfo, ProbeError> {
        let url = format!("http://ip-api.com/json/{ip}?fields={IP_API_FIELDS}");
        parse_ip_api(get_json(&self.client, &url).await?)
    }

    async fn ipwho(&self, ip: &str) -> Result<GeoInfo, ProbeError> {
        let url = format!("https://ipwho.is/{ip}");
        parse_ipwho(get_json(&self.client, &url).await?)
    }

    async fn scan(&self, ip: &str) -> Result<ModuleOutput, ModuleError> {
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| ModuleError::Unsupported(format!("'{ip}' is not an IP address")))?;
        if !is_public(addr) {
            return Err(ModuleError::Unsupported(format!(
                "{ip} is not a publicly routable address"
            )));
        }

        let mut probes = ProbeSet::new(MODULE_ID);
        let (ip_api, ipwho) = tokio::join!(self.ip_api(ip), self.ipwho(ip));
        for (provider, result) in [("ip-api", ip_api), ("ipwho", ipwho)] {
            if let Some(info) = probes.record(provider, result) {
                for rel in info.relationships(ip) {
                    probes.relate(rel);
                }
                probes.insert(provider, info.to_json());
            }
        }
        probes.finish()
    }
}

impl ReconModule for GeoIpModule {
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
