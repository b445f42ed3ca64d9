//! HTTP 클라이언트 구성 및 공통 요청 헬퍼

use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use reconpost_core::config::ModulesConfig;

use crate::error::ProbeError;

/// 최대 리다이렉트 추적 횟수
const MAX_REDIRECTS: usize = 5;

/// 리다이렉트를 따라가는 기본 클라이언트를 생성합니다.
pub fn build_client(config: &ModulesConfig) -> Result<Client, reqwest::Error> {
    builder(config).redirect(Policy::limited(MAX_REDIRECTS)).build()
}

/// 리다이렉트를 따라가지 않는 클라이언트를 생성합니다.
///
/// `headers` 모듈이 `Location`을 직접 관찰할 때 사용합니다.
pub fn build_no_redirect_client(config: &ModulesConfig) -> Result<Client, reqwest::Error> {
    builder(config).redirect(Policy::none()).build()
}

fn builder(config: &ModulesConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.http_timeout())
        .connect_timeout(config.http_timeout())
}

/// GET 요청 후 2xx 응답을 JSON으로 해석합니다.
pub(crate) async fn get_json(client: &Client, url: &str) -> Result<Value, ProbeError> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(ProbeError::Status {
            status: status.as_u16(),
        });
    }
    resp.json::<Value>()
        .await
        .map_err(|e| ProbeError::Decode(e.to_string()))
}

/// 존재 여부 판정용 GET 요청
///
/// 200은 존재, 404는 부재이며 그 외 상태는 실패입니다.
pub(crate) async fn probe_presence(client: &Client, url: &str) -> Result<bool, ProbeError> {
    let resp = client.get(url).send().await?;
    presence_from_status(resp.status())
}

pub(crate) fn presence_from_status(status: StatusCode) -> Result<bool, ProbeError> {
    match status {
        StatusCode::OK => Ok(true),
        StatusCode::NOT_FOUND => Ok(false),
        other => Err(ProbeError::Status {
            status: other.as_u16(),
        }),
    }
}

/// URL 호스트 자리에 넣을 수 있는 형태로 변환합니다 (IPv6는 대괄호).
pub(crate) fn url_host(host: &str) -> String {
    if host.contains(':') {
        format!("[{host}]")
    } else {
        host.to_owned()
    }
}
