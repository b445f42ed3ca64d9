//! 설정 관리: reconpost.toml 파싱 및 런타임 설정
//!
//! [`ReconpostConfig`]는 데몬과 CLI가 공유하는 최상위 설정 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`RECONPOST_SCAN_MODULE_TIMEOUT_SECS=10` 형식)
//! 3. 설정 파일 (`reconpost.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), reconpost_core::error::ReconError> {
//! use reconpost_core::config::ReconpostConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = ReconpostConfig::load("reconpost.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = ReconpostConfig::parse("[scan]\nmodule_timeout_secs = 10")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ReconError};

/// reconpost 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconpostConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// HTTP API 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 스캔 오케스트레이터 설정
    #[serde(default)]
    pub scan: ScanConfig,
    /// 정찰 모듈 설정
    #[serde(default)]
    pub modules: ModulesConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl ReconpostConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ReconError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ReconError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ReconError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ReconError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// 파일이 있으면 로드하고, 없으면 기본값에 환경변수만 적용합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ReconError> {
        match Self::load(path.as_ref()).await {
            Err(ReconError::Config(ConfigError::FileNotFound { path })) => {
                warn!(path, "config file not found, using defaults");
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
            other => other,
        }
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ReconError> {
        toml::from_str(toml_str).map_err(|e| {
            ReconError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `RECONPOST_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "RECONPOST_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "RECONPOST_GENERAL_LOG_FORMAT");

        // Server
        override_string(&mut self.server.listen_addr, "RECONPOST_SERVER_LISTEN_ADDR");
        override_u16(&mut self.server.port, "RECONPOST_SERVER_PORT");

        // Scan
        override_u64(
            &mut self.scan.module_timeout_secs,
            "RECONPOST_SCAN_MODULE_TIMEOUT_SECS",
        );
        override_usize(
            &mut self.scan.max_concurrent_modules,
            "RECONPOST_SCAN_MAX_CONCURRENT_MODULES",
        );
        override_u64(
            &mut self.scan.job_retention_secs,
            "RECONPOST_SCAN_JOB_RETENTION_SECS",
        );
        override_u64(
            &mut self.scan.max_job_runtime_secs,
            "RECONPOST_SCAN_MAX_JOB_RUNTIME_SECS",
        );
        override_u64(
            &mut self.scan.sweep_interval_secs,
            "RECONPOST_SCAN_SWEEP_INTERVAL_SECS",
        );

        // Modules
        override_csv(&mut self.modules.disabled, "RECONPOST_MODULES_DISABLED");
        override_u64(
            &mut self.modules.http_timeout_secs,
            "RECONPOST_MODULES_HTTP_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.modules.dns_timeout_secs,
            "RECONPOST_MODULES_DNS_TIMEOUT_SECS",
        );
        override_string(&mut self.modules.user_agent, "RECONPOST_MODULES_USER_AGENT");
        override_u16_csv(&mut self.modules.ports, "RECONPOST_MODULES_PORTS");
        override_u64(
            &mut self.modules.port_timeout_ms,
            "RECONPOST_MODULES_PORT_TIMEOUT_MS",
        );
        override_csv(
            &mut self.modules.subdomain_prefixes,
            "RECONPOST_MODULES_SUBDOMAIN_PREFIXES",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "RECONPOST_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "RECONPOST_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "RECONPOST_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "RECONPOST_METRICS_ENDPOINT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ReconError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.server.listen_addr.trim().is_empty() {
            return Err(invalid("server.listen_addr", "must not be empty"));
        }

        if self.scan.module_timeout_secs == 0 {
            return Err(invalid("scan.module_timeout_secs", "must be greater than 0"));
        }
        if self.scan.max_concurrent_modules == 0 {
            return Err(invalid(
                "scan.max_concurrent_modules",
                "must be greater than 0",
            ));
        }
        if self.scan.sweep_interval_secs == 0 {
            return Err(invalid("scan.sweep_interval_secs", "must be greater than 0"));
        }
        if self.scan.max_job_runtime_secs < self.scan.module_timeout_secs {
            return Err(invalid(
                "scan.max_job_runtime_secs",
                "must be at least scan.module_timeout_secs",
            ));
        }

        if self.modules.http_timeout_secs == 0 {
            return Err(invalid("modules.http_timeout_secs", "must be greater than 0"));
        }
        if self.modules.dns_timeout_secs == 0 {
            return Err(invalid("modules.dns_timeout_secs", "must be greater than 0"));
        }
        if self.modules.port_timeout_ms == 0 {
            return Err(invalid("modules.port_timeout_ms", "must be greater than 0"));
        }
        if self.modules.ports.contains(&0) {
            return Err(invalid("modules.ports", "port 0 is not scannable"));
        }

        if self.metrics.enabled && !self.metrics.endpoint.starts_with('/') {
            return Err(invalid("metrics.endpoint", "must start with '/'"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ReconError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// HTTP API 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1".to_owned(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// `addr:port` 형식의 바인딩 문자열
    pub fn bind_addr(&self) -> String {
        if self.listen_addr.contains(':') {
            format!("[{}]:{}", self.listen_addr, self.port)
        } else {
            format!("{}:{}", self.listen_addr, self.port)
        }
    }
}

/// 스캔 오케스트레이터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// 모듈당 하드 데드라인 (초)
    pub module_timeout_secs: u64,
    /// 모든 잡을 통틀어 동시에 실행되는 모듈 상한
    pub max_concurrent_modules: usize,
    /// 완료된 잡 보존 시간 (초)
    pub job_retention_secs: u64,
    /// 실행 중 잡의 최대 수명 (초)
    pub max_job_runtime_secs: u64,
    /// 스위퍼 주기 (초)
    pub sweep_interval_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            module_timeout_secs: 30,
            max_concurrent_modules: 32,
            job_retention_secs: 3600,
            max_job_runtime_secs: 600,
            sweep_interval_secs: 30,
        }
    }
}

impl ScanConfig {
    pub fn module_timeout(&self) -> Duration {
        Duration::from_secs(self.module_timeout_secs)
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_secs)
    }

    pub fn max_job_runtime(&self) -> Duration {
        Duration::from_secs(self.max_job_runtime_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// 정찰 모듈 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesConfig {
    /// 등록하지 않을 모듈 ID
    pub disabled: Vec<String>,
    /// HTTP 요청 타임아웃 (초)
    pub http_timeout_secs: u64,
    /// DNS 질의 타임아웃 (초)
    pub dns_timeout_secs: u64,
    /// HTTP User-Agent
    pub user_agent: String,
    /// 포트 스캔 대상 포트
    pub ports: Vec<u16>,
    /// 포트당 연결 타임아웃 (밀리초)
    pub port_timeout_ms: u64,
    /// 서브도메인 브루트포스 접두어
    pub subdomain_prefixes: Vec<String>,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            disabled: Vec::new(),
            http_timeout_secs: 10,
            dns_timeout_secs: 5,
            user_agent: concat!("reconpost/", env!("CARGO_PKG_VERSION")).to_owned(),
            ports: vec![
                21, 22, 23, 25, 53, 80, 110, 143, 443, 445, 465, 587, 993, 995, 3306, 3389, 5432,
                6379, 8080, 8443,
            ],
            port_timeout_ms: 1500,
            subdomain_prefixes: [
                "www", "mail", "ftp", "api", "dev", "staging", "test", "admin", "vpn", "portal",
                "blog", "shop", "cdn", "m", "app",
            ]
            .iter()
            .map(|s| (*s).to_owned())
            .collect(),
        }
    }
}

impl ModulesConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }

    pub fn port_timeout(&self) -> Duration {
        Duration::from_millis(self.port_timeout_ms)
    }

    /// 모듈이 비활성화되어 있는지 확인합니다.
    pub fn is_disabled(&self, id: &str) -> bool {
        self.disabled.iter().any(|d| d == id)
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 익스포터 활성화 여부
    pub enabled: bool,
    /// 바인딩 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.trim().parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

fn override_u16_csv(target: &mut Vec<u16>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        let parsed: Result<Vec<u16>, _> = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<u16>)
            .collect();
        match parsed {
            Ok(ports) => *target = ports,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse port list from env var, ignoring"
            ),
        }
    }
}
