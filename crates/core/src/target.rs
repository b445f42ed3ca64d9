//! 타겟 해석: 원시 입력을 정규화된 [`Target`]으로 변환
//!
//! 명시 타입이 없으면 다음 순서로 추론합니다.
//!
//! ```text
//! IP 리터럴 → 이메일 → 도메인 → 사용자명
//! ```

use std::net::IpAddr;

use crate::error::ValidationError;
use crate::types::{Target, TargetType};

/// 도메인 전체 최대 길이
const MAX_DOMAIN_LEN: usize = 253;

/// 라벨 최대 길이
const MAX_LABEL_LEN: usize = 63;

/// 원시 입력을 정규화된 타겟으로 해석합니다.
///
/// 입력이 비어 있거나 명시 타입과 형태가 맞지 않으면 [`ValidationError`]를 반환합니다.
pub fn resolve(raw: &str, explicit: Option<TargetType>) -> Result<Target, ValidationError> {
    let input = raw.trim();
    if input.is_empty() {
        return Err(ValidationError::EmptyTarget);
    }

    match explicit {
        Some(kind) => {
            let value = normalize_as(input, kind).ok_or_else(|| ValidationError::TypeMismatch {
                value: input.to_owned(),
                expected: kind.to_string(),
            })?;
            Ok(Target::new(value, kind))
        }
        None => Ok(infer(input)),
    }
}

fn infer(input: &str) -> Target {
    if let Some(ip) = normalize_ip(input) {
        return Target::new(ip, TargetType::Ip);
    }
    if input.contains('@') {
        if let Some(email) = normalize_email(input) {
            return Target::new(email, TargetType::Email);
        }
    }
    if input.contains('.') {
        if let Some(domain) = normalize_domain(input) {
            return Target::new(domain, TargetType::Domain);
        }
    }
    match normalize_username(input) {
        Some(username) => Target::new(username, TargetType::Username),
        // "@" 단독 입력
        None => Target::new(input.to_owned(), TargetType::Username),
    }
}

fn normalize_as(input: &str, kind: TargetType) -> Option<String> {
    match kind {
        TargetType::Domain => normalize_domain(input),
        TargetType::Ip => normalize_ip(input),
        TargetType::Email => normalize_email(input),
        TargetType::Username => normalize_username(input),
    }
}

/// IP 리터럴을 표준 텍스트 형식으로 정규화합니다.
fn normalize_ip(input: &str) -> Option<String> {
    let bare = input
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(input);
    bare.parse::<IpAddr>().ok().map(|ip| ip.to_string())
}

/// URL 형태 입력에서 호스트를 추출해 도메인으로 정규화합니다.
fn normalize_domain(input: &str) -> Option<String> {
    let mut host = input;
    if let Some((_, rest)) = host.split_once("://") {
        host = rest;
    }
    if let Some(end) = host.find(['/', '?', '#']) {
        host = &host[..end];
    }
    if let Some((_, rest)) = host.rsplit_once('@') {
        host = rest;
    }
    if let Some((name, port)) = host.rsplit_once(':') {
        if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) {
            host = name;
        }
    }
    let host = host.strip_suffix('.').unwrap_or(host).to_ascii_lowercase();
    is_valid_domain(&host).then_some(host)
}

fn normalize_email(input: &str) -> Option<String> {
    let (local, domain) = input.split_once('@')?;
    if domain.contains('@') || local.is_empty() || local.chars().any(char::is_whitespace) {
        return None;
    }
    let domain = domain.strip_suffix('.').unwrap_or(domain).to_ascii_lowercase();
    if !is_valid_domain(&domain) {
        return None;
    }
    Some(format!("{}@{domain}", local.to_lowercase()))
}

fn normalize_username(input: &str) -> Option<String> {
    let name = input.strip_prefix('@').unwrap_or(input).trim();
    (!name.is_empty()).then(|| name.to_owned())
}

/// 소문자화가 끝난 도메인 이름의 라벨 규칙을 검사합니다.
pub fn is_valid_domain(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_DOMAIN_LEN {
        return false;
    }
    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 || !labels.iter().all(|l| is_valid_label(l)) {
        return false;
    }
    labels
        .last()
        .is_some_and(|tld| !tld.bytes().all(|b| b.is_ascii_digit()))
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}
