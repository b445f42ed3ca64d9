//! Logging initialization for reconpost-daemon.
//!
//! Builds the `tracing-subscriber` stack from the `[general]` section of
//! `ReconpostConfig`. Scan and module spans opened by the engine carry
//! `job_id` and `module_id`, so every probe event emitted inside a scan
//! is attributed to its job in both output formats.

use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use reconpost_core::config::GeneralConfig;

/// Transport and resolver crates held at `warn` unless `RUST_LOG` says otherwise.
const QUIET_TARGETS: [&str; 7] = [
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
    "hickory_proto",
    "hickory_resolver",
];

/// Output format of the daemon's log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, including the active span fields.
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                other
            )),
        }
    }
}

/// Build the event filter.
///
/// Non-empty `rust_log` directives replace the configured level entirely.
/// Otherwise `level` applies to every target, transport and resolver
/// crates are capped at `warn`, and `tower_http` request spans follow
/// `level`.
pub fn build_filter(level: &str, rust_log: Option<&str>) -> Result<EnvFilter> {
    if let Some(directives) = rust_log.map(str::trim).filter(|d| !d.is_empty()) {
        return EnvFilter::try_new(directives)
            .with_context(|| format!("invalid RUST_LOG directives '{directives}'"));
    }

    let max = LevelFilter::from_str(level)
        .map_err(|e| anyhow!("invalid log level '{}': {}", level, e))?;
    let mut filter = EnvFilter::default().add_directive(max.into());
    if max > LevelFilter::WARN {
        for target in QUIET_TARGETS {
            filter = filter.add_directive(directive(&format!("{target}=warn"))?);
        }
    }
    Ok(filter.add_directive(directive(&format!("tower_http={max}"))?))
}

fn directive(raw: &str) -> Result<Directive> {
    raw.parse()
        .with_context(|| format!("invalid filter directive '{raw}'"))
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let format: LogFormat = config.log_format.parse()?;
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let env_filter = build_filter(&config.log_level, rust_log.as_deref())?;

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(false),
                )
                .try_init()
                .map_err(|e| {
                    anyhow!("failed to initialize JSON tracing subscriber: {}", e)
                })?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .map_err(|e| {
                    anyhow!("failed to initialize pretty tracing subscriber: {}", e)
                })?;
        }
    }

    Ok(())
}
