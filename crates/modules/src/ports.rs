//! `ports` 모듈: 설정된 포트에 TCP 연결 시도
//!
//! 연결 성공(open)과 연결 거부(closed)는 모두 응답으로 간주합니다.
//! 응답 없이 타임아웃되면 해당 포트 프로브는 실패입니다.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use reconpost_core::{
    CancellationToken, ModuleDescriptor, ModuleError, ModuleOutput, ProbeSet, ReconModule,
    Relationship, Target, TargetType, relation, until_cancelled,
};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::task::{JoinError, JoinSet};
use tracing::debug;

use crate::error::ProbeError;
use crate::http::url_host;

pub const MODULE_ID: &str = "ports";

/// 포트 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PortState {
    Open,
    Closed,
}

/// 잘 알려진 포트의 서비스 이름
pub fn service_name(port: u16) -> &'static str {
    match port {
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 => "smtp",
        53 => "dns",
        80 => "http",
        110 => "pop3",
        143 => "imap",
        443 => "https",
        445 => "smb",
        465 => "smtps",
        587 => "submission",
        993 => "imaps",
        995 => "pop3s",
        3306 => "mysql",
        3389 => "rdp",
        5432 => "postgresql",
        6379 => "redis",
        8080 => "http-alt",
        8443 => "https-alt",
        _ => "unknown",
    }
}

/// 단일 포트에 연결을 시도합니다.
pub(crate) async fn probe_port(host: &str, port: u16, timeout: Duration) -> Result<PortState, ProbeError> {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => Ok(PortState::Open),
        Ok(Err(err)) if err.kind() == ErrorKind::ConnectionRefused => Ok(PortState::Closed),
        Ok(Err(err)) => Err(ProbeError::Connect(err.to_string())),
        Err(_) => Err(ProbeError::Timeout {
            ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// 패닉하거나 중단된 포트 태스크를 프로브 실패로 변환합니다.
pub(crate) fn task_failure(err: &JoinError) -> ProbeError {
    debug!(module = MODULE_ID, error = %err, "port task failed");
    if err.is_panic() {
        ProbeError::Task("port task panicked".to_owned())
    } else {
        ProbeError::Task(err.to_string())
    }
}

/// TCP 포트 스캔 모듈
pub struct PortsModule {
    descriptor: ModuleDescriptor,
    ports: Arc<[u16]>,
    timeout: Duration,
}

impl PortsModule {
    pub fn new(ports: Vec<u16>, timeout: Duration) -> Self {
        Self {
            descriptor: ModuleDescriptor::new(
                MODULE_ID,
                "TCP Ports",
                "Attempts TCP connections to a configured list of common ports",
                [TargetType::Domain, TargetType::Ip],
            ),
            ports: ports.into(),
            timeout,
        }
    }

    async fn scan(&self, host: &str) -> Result<ModuleOutput, ModuleError> {
        let mut tasks = JoinSet::new();
        let mut ids = HashMap::new();
        let mut results = BTreeMap::new();
        for &port in self.ports.iter() {
            let host = host.to_owned();
            let timeout = self.timeout;
            let handle = tasks.spawn(async move { (port, probe_port(&host, port, timeout).await) });
            ids.insert(handle.id(), port);
        }
        while let Some(joined) = tasks.join_next_with_id().await {
            let (port, result) = match joined {
                Ok((_, outcome)) => outcome,
                Err(err) => match ids.get(&err.id()) {
                    Some(&port) => (port, Err(task_failure(&err))),
                    None => continue,
                },
            };
            results.insert(port, result);
        }

        let mut probes = ProbeSet::new(MODULE_ID);
        let mut open = Vec::new();
        let mut closed = Vec::new();
        for (port, result) in results {
            match probes.record(&port.to_string(), result) {
                Some(PortState::Open) => {
                    let service = service_name(port);
                    open.push(json!({"port": port, "service": service}));
                    probes.relate(
                        Relationship::new(
                            host,
                            format!("{}:{port}", url_host(host)),
                            relation::HAS_OPEN_PORT,
                        )
                        .with_label(service),
                    );
                }
                Some(PortState::Closed) => closed.push(port),
                None => {}
            }
        }
        probes.insert("open", open);
        probes.insert("closed", closed);
        probes.finish()
    }
}

impl ReconModule for PortsModule {
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
