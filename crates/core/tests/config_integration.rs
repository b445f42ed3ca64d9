//! reconpost.toml 통합 설정 테스트
//!
//! - reconpost.toml.example 파싱 테스트
//! - 부분 설정 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 파일 로딩 에러 테스트

use std::io::Write;

use reconpost_core::config::ReconpostConfig;
use reconpost_core::error::{ConfigError, ReconError};

const EXAMPLE: &str = include_str!("../../../reconpost.toml.example");

// =============================================================================
// reconpost.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_and_validates() {
    let config = ReconpostConfig::parse(EXAMPLE).expect("example config should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let example = ReconpostConfig::parse(EXAMPLE).expect("should parse");
    let defaults = ReconpostConfig::default();

    assert_eq!(example.general.log_level, defaults.general.log_level);
    assert_eq!(example.server.port, defaults.server.port);
    assert_eq!(
        example.scan.module_timeout_secs,
        defaults.scan.module_timeout_secs
    );
    assert_eq!(
        example.scan.max_concurrent_modules,
        defaults.scan.max_concurrent_modules
    );
    assert_eq!(
        example.scan.job_retention_secs,
        defaults.scan.job_retention_secs
    );
    assert_eq!(example.modules.ports, defaults.modules.ports);
    assert_eq!(
        example.modules.subdomain_prefixes,
        defaults.modules.subdomain_prefixes
    );
    assert_eq!(example.metrics.port, defaults.metrics.port);
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_server_only() {
    let toml = r#"
[server]
listen_addr = "0.0.0.0"
port = 9000
"#;
    let config = ReconpostConfig::parse(toml).expect("should parse");
    assert_eq!(config.server.bind_addr(), "0.0.0.0:9000");
    assert_eq!(config.scan.module_timeout_secs, 30);
    assert!(config.modules.disabled.is_empty());
}

#[test]
fn partial_config_two_sections() {
    let toml = r#"
[scan]
max_concurrent_modules = 4

[metrics]
enabled = true
port = 9200
"#;
    let config = ReconpostConfig::parse(toml).expect("should parse");
    assert_eq!(config.scan.max_concurrent_modules, 4);
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.port, 9200);
    assert_eq!(config.metrics.endpoint, "/metrics");
    config.validate().expect("should validate");
}

#[test]
fn wrong_field_type_is_parse_error() {
    let toml = r#"
[scan]
module_timeout_secs = "thirty"
"#;
    let err = ReconpostConfig::parse(toml).unwrap_err();
    assert!(matches!(
        err,
        ReconError::Config(ConfigError::ParseFailed { .. })
    ));
}

// =============================================================================
// 파일 로딩 테스트
// =============================================================================

#[tokio::test]
async fn load_reads_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "[scan]\nmodule_timeout_secs = 12").expect("write");

    let config = ReconpostConfig::from_file(file.path())
        .await
        .expect("should load");
    assert_eq!(config.scan.module_timeout_secs, 12);
}

#[tokio::test]
async fn from_file_rejects_invalid_values() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "[general]\nlog_format = \"xml\"").expect("write");

    let err = ReconpostConfig::from_file(file.path()).await.unwrap_err();
    assert!(matches!(
        err,
        ReconError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "general.log_format"
    ));
}

#[tokio::test]
#[serial_test::serial]
async fn load_or_default_falls_back_when_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ReconpostConfig::load_or_default(dir.path().join("absent.toml"))
        .await
        .expect("defaults should load");
    assert_eq!(config.server.port, 8080);
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[general]
log_level = "info"
"#;

    let original = std::env::var("RECONPOST_GENERAL_LOG_LEVEL").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("RECONPOST_GENERAL_LOG_LEVEL", "error");
    }

    let mut config = ReconpostConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    let result = config.general.log_level.clone();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("RECONPOST_GENERAL_LOG_LEVEL", val),
            None => std::env::remove_var("RECONPOST_GENERAL_LOG_LEVEL"),
        }
    }

    assert_eq!(result, "error");
}

#[test]
#[serial_test::serial]
fn env_override_csv_for_disabled_modules() {
    let original = std::env::var("RECONPOST_MODULES_DISABLED").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("RECONPOST_MODULES_DISABLED", "ports, username");
    }

    let mut config = ReconpostConfig::default();
    config.apply_env_overrides();
    let result = config.modules.disabled.clone();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("RECONPOST_MODULES_DISABLED", val),
            None => std::env::remove_var("RECONPOST_MODULES_DISABLED"),
        }
    }

    assert_eq!(result, vec!["ports", "username"]);
}

#[tokio::test]
#[serial_test::serial]
async fn load_applies_env_then_validates() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "[scan]\nmodule_timeout_secs = 10").expect("write");

    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("RECONPOST_SCAN_MODULE_TIMEOUT_SECS", "0");
    }
    let result = ReconpostConfig::load(file.path()).await;
    // SAFETY: 테스트 정리
    unsafe {
        std::env::remove_var("RECONPOST_SCAN_MODULE_TIMEOUT_SECS");
    }

    let err = result.unwrap_err();
    assert!(err.to_string().contains("module_timeout_secs"));
}
