//! `reverse_dns` 모듈: IP 주소의 PTR 레코드 질의

use std::net::IpAddr;

use reconpost_core::{
    CancellationToken, ModuleDescriptor, ModuleError, ModuleOutput, ProbeSet, ReconModule,
    Relationship, Target, TargetType, relation, until_cancelled,
};

use crate::resolver::RecordLookup;

pub const MODULE_ID: &str = "reverse_dns";

/// 역방향 DNS 모듈
pub struct ReverseDnsModule<L> {
    descriptor: ModuleDescriptor,
    lookup: L,
}

impl<L: RecordLookup> ReverseDnsModule<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            descriptor: ModuleDescriptor::new(
                MODULE_ID,
                "Reverse DNS",
                "Resolves PTR records for an IP address",
                [TargetType::Ip],
            ),
            lookup,
        }
    }

    async fn scan(&self, ip: &str) -> Result<ModuleOutput, ModuleError> {
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| ModuleError::Unsupported(format!("'{ip}' is not an IP address")))?;

        let mut probes = ProbeSet::new(MODULE_ID);
        if let Some(names) = probes.record("PTR", self.lookup.reverse(addr).await) {
            for name in &names {
                probes.relate(Relationship::new(ip, name.as_str(), relation::HAS_PTR));
            }
            probes.insert("PTR", names);
        }
        probes.finish()
    }
}

impl<L: RecordLookup> ReconModule for ReverseDnsModule<L> {
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
