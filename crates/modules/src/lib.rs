//! reconpost 정찰 모듈
//!
//! 각 모듈은 [`ReconModule`](reconpost_core::ReconModule)을 구현하며, 독립적인 프로브 여러 개를
//! [`ProbeSet`](reconpost_core::ProbeSet)으로 집계합니다. 실패한 프로브는 건너뛰고
//! 하나 이상 성공하면 모듈이 성공합니다.
//!
//! # 모듈 목록
//!
//! | id | 대상 |
//! |----|------|
//! | `dns` | domain |
//! | `whois` | domain, ip |
//! | `subdomains` | domain |
//! | `headers` | domain, ip |
//! | `geoip` | ip |
//! | `ports` | domain, ip |
//! | `reverse_dns` | ip |
//! | `email` | email |
//! | `username` | username |

pub mod dns;
pub mod email;
pub mod error;
pub mod geoip;
pub mod headers;
pub mod http;
pub mod ports;
pub mod resolver;
pub mod reverse_dns;
pub mod subdomains;
pub mod username;
pub mod whois;

use reconpost_core::config::ModulesConfig;
use reconpost_core::error::{ConfigError, ReconError};
use reconpost_core::{ModuleRegistry, ReconModule};
use tracing::{debug, info};

pub use dns::DnsModule;
pub use email::EmailModule;
pub use error::ProbeError;
pub use geoip::GeoIpModule;
pub use headers::HeadersModule;
pub use ports::PortsModule;
pub use resolver::{HickoryLookup, Record, RecordKind, RecordLookup, StaticLookup};
pub use reverse_dns::ReverseDnsModule;
pub use subdomains::SubdomainsModule;
pub use username::UsernameModule;
pub use whois::WhoisModule;

/// 설정에 따라 기본 모듈 레지스트리를 구성합니다.
///
/// 등록 순서가 곧 `list()` 순서입니다. `modules.disabled`에 있는 id는 건너뜁니다.
pub fn default_registry(config: &ModulesConfig) -> Result<ModuleRegistry, ReconError> {
    let client = http::build_client(config).map_err(client_error)?;
    let no_redirect = http::build_no_redirect_client(config).map_err(client_error)?;
    let lookup = HickoryLookup::new(config.dns_timeout());

    let mut registry = ModuleRegistry::new();
    register(
        &mut registry,
        config,
        DnsModule::new(lookup.clone()).with_kind_timeout(config.dns_timeout().saturating_mul(2)),
    )?;
    register(&mut registry, config, WhoisModule::new(client.clone()))?;
    register(
        &mut registry,
        config,
        SubdomainsModule::new(
            client.clone(),
            lookup.clone(),
            config.subdomain_prefixes.clone(),
        ),
    )?;
    register(&mut registry, config, HeadersModule::new(no_redirect))?;
    register(&mut registry, config, GeoIpModule::new(client.clone()))?;
    register(
        &mut registry,
        config,
        PortsModule::new(config.ports.clone(), config.port_timeout()),
    )?;
    register(&mut registry, config, ReverseDnsModule::new(lookup.clone()))?;
    register(&mut registry, config, EmailModule::new(client.clone(), lookup))?;
    register(&mut registry, config, UsernameModule::new(client))?;

    info!(modules = registry.count(), "module registry built");
    Ok(registry)
}

fn register<M: ReconModule + 'static>(
    registry: &mut ModuleRegistry,
    config: &ModulesConfig,
    module: M,
) -> Result<(), ReconError> {
    let id = module.descriptor().id.clone();
    if config.is_disabled(&id) {
        debug!(module = %id, "module disabled by configuration");
        return Ok(());
    }
    registry.register(module)?;
    Ok(())
}

fn client_error(err: reqwest::Error) -> ReconError {
    ConfigError::InvalidValue {
        field: "modules".to_owned(),
        reason: format!("failed to build HTTP client: {err}"),
    }
    .into()
}
