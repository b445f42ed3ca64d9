//! `username` 모듈: 고정 사이트 목록에서 프로필 존재 여부 확인
//!
//! 사이트마다 하나의 프로브이며 200은 존재, 404는 부재입니다.

use std::sync::Arc;

use reconpost_core::{
    CancellationToken, ModuleDescriptor, ModuleError, ModuleOutput, ProbeSet, ReconModule,
    Relationship, Target, TargetType, relation, until_cancelled,
};
use reqwest::Client;
use serde_json::{Value, json};
use tokio::task::JoinSet;

use crate::http::probe_presence;

pub const MODULE_ID: &str = "username";

/// 프로필 확인 대상 사이트
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Site {
    pub name: &'static str,
    /// 사용자에게 보여줄 프로필 URL (`{}` 자리에 사용자명)
    pub profile: &'static str,
    /// 존재 확인용 URL
    pub check: &'static str,
}

/// 기본 사이트 목록
pub const SITES: &[Site] = &[
    Site {
        name: "github",
        profile: "https://github.com/{}",
        check: "https://api.github.com/users/{}",
    },
    Site {
        name: "gitlab",
        profile: "https://gitlab.com/{}",
        check: "https://gitlab.com/{}",
    },
    Site {
        name: "keybase",
        profile: "https://keybase.io/{}",
        check: "https://keybase.io/{}",
    },
    Site {
        name: "dev.to",
        profile: "https://dev.to/{}",
        check: "https://dev.to/api/users/by_username?url={}",
    },
    Site {
        name: "dockerhub",
        profile: "https://hub.docker.com/u/{}",
        check: "https://hub.docker.com/v2/users/{}/",
    },
    Site {
        name: "pypi",
        profile: "https://pypi.org/user/{}/",
        check: "https://pypi.org/user/{}/",
    },
    Site {
        name: "crates.io",
        profile: "https://crates.io/users/{}",
        check: "https://crates.io/api/v1/users/{}",
    },
    Site {
        name: "reddit",
        profile: "https://www.reddit.com/user/{}",
        check: "https://www.reddit.com/user/{}/about.json",
    },
];

impl Site {
    pub fn profile_url(&self, username: &str) -> String {
        self.profile.replace("{}", &urlencoding::encode(username))
    }

    pub fn check_url(&self, username: &str) -> String {
        self.check.replace("{}", &urlencoding::encode(username))
    }
}

/// 사용자명 프로필 모듈
pub struct UsernameModule {
    descriptor: ModuleDescriptor,
    client: Client,
    sites: Arc<[Site]>,
}

impl UsernameModule {
    pub fn new(client: Client) -> Self {
        Self::with_sites(client, SITES.to_vec())
    }

    /// 사이트 목록을 교체합니다.
    pub fn with_sites(client: Client, sites: Vec<Site>) -> Self {
        Self {
            descriptor: ModuleDescriptor::new(
                MODULE_ID,
                "Username Footprint",
                "Checks whether a username has a profile on well-known sites",
                [TargetType::Username],
            ),
            client,
            sites: sites.into(),
        }
    }

    async fn scan(&self, username: &str) -> Result<ModuleOutput, ModuleError> {
        let mut tasks = JoinSet::new();
        for (index, site) in self.sites.iter().copied().enumerate() {
            let client = self.client.clone();
            let url = site.check_url(username);
            tasks.spawn(async move { (index, site, probe_presence(&client, &url).await) });
        }

        let mut results = Vec::with_capacity(self.sites.len());
        while let Some(joined) = tasks.join_next().await {
            if let Ok(result) = joined {
                results.push(result);
            }
        }
        // 사이트 목록 순서 유지
        results.sort_by_key(|(index, _, _)| *index);

        let mut probes = ProbeSet::new(MODULE_ID);
        let mut profiles = Vec::new();
        for (_, site, result) in results {
            let Some(present) = probes.record(site.name, result) else {
                continue;
            };
            let url = site.profile_url(username);
            if present {
                probes.relate(
                    Relationship::new(username, url.as_str(), relation::HAS_PROFILE)
                        .with_label(site.name),
                );
            }
            profiles.push(json!({"site": site.name, "url": url, "present": present}));
        }
        probes.insert("profiles", Value::Array(profiles));
        probes.finish()
    }
}

impl ReconModule for UsernameModule {
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

    #[test]
    fn urls_encode_the_username() {
        let github = SITES[0];
        assert_eq!(github.profile_url("octocat"), "https://github.com/octocat");
        assert_eq!(
            github.check_url("a b/c"),
            "https://api.github.com/users/a%20b%2Fc"
        );
    }

    #[test]
    fn site_names_are_unique() {
        let mut names: Vec<_> = SITES.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), SITES.len());
    }

    #[tokio::test]
    async fn unreachable_sites_fail_the_module() {
        let sites = vec![
            Site {
                name: "local-a",
                profile: "http://127.0.0.1:9/{}",
                check: "http://127.0.0.1:9/{}",
            },
            Site {
                name: "local-b",
                profile: "http://127.0.0.1:9/b/{}",
                check: "http://127.0.0.1:9/b/{}",
            },
        ];
        let module = UsernameModule::with_sites(Client::new(), sites);
        let target = reconpost_core::resolve("@octocat", None).unwrap();
        let err = ReconModule::run(&module, &target, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ModuleError::NoResults { attempted: 2, .. }));
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn live_github_profile() {
        let client = crate::http::build_client(&Default::default()).unwrap();
        let module = UsernameModule::new(client);
        let target = reconpost_core::resolve("octocat", None).unwrap();
        let output = ReconModule::run(&module, &target, CancellationToken::new())
            .await
            .unwrap();
        assert!(output.relationships.iter().any(|r| r.label.as_deref() == Some("github")));
    }
}
