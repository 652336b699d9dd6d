//! 会话 cookie 存储
//!
//! 浏览器里的 cookie 存储在 SDK 中由 [`SessionCookieStore`] 承担：
//! 作为 reqwest 的 cookie provider 接收 Set-Cookie，并在每次请求时回填 Cookie 头。
//! 支持 `Max-Age` / `Expires` 过期，可选地通过 [`crate::chat::cookie_dao::CookieDao`] 持久化。

use chrono::{DateTime, Duration, Utc};
use cookie::Cookie;
use reqwest::header::HeaderValue;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// 单条 cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCookie {
    /// host-only cookie 为请求主机，否则为 `Domain` 属性（不带前导点）
    pub host: String,
    pub name: String,
    pub value: String,
    pub path: String,
    /// 只在 https 请求中发送
    pub secure: bool,
    /// 没有 `Domain` 属性，只发给完全相同的主机
    pub host_only: bool,
    /// 过期时间，None 表示会话级 cookie
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredCookie {
    /// 对整个主机生效的会话级 cookie
    pub fn session(host: impl Into<String>, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            name: name.into(),
            value: value.into(),
            path: "/".to_string(),
            secure: false,
            host_only: true,
            expires_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    /// 是否应随该 URL 的请求发送（domain / path / secure 匹配）
    pub fn matches(&self, url: &Url) -> bool {
        let host = match url.host_str() {
            Some(h) => h.to_ascii_lowercase(),
            None => return false,
        };
        let domain_ok = if self.host_only {
            host == self.host
        } else {
            domain_matches(&host, &self.host)
        };
        domain_ok && path_matches(url.path(), &self.path) && (!self.secure || url.scheme() == "https")
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/')
            || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/'))
}

/// 没有 `Path` 属性时取请求路径的目录部分
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// 从 `a=1; b=2` 形式的 Cookie 串中取出指定名称的值（URL 解码）
pub fn get_cookie(cookies: &str, name: &str) -> Option<String> {
    cookies
        .split(';')
        .map(str::trim)
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| {
            urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
}

/// 解析一条 Set-Cookie 头（属性解析交给 `cookie` crate）
///
/// `Max-Age` 优先于 `Expires`；`Domain` 与请求主机不匹配的 cookie 被拒绝。
pub fn parse_set_cookie(header: &str, url: &Url, now: DateTime<Utc>) -> Option<StoredCookie> {
    let parsed = match Cookie::parse(header) {
        Ok(c) => c,
        Err(e) => {
            debug!("[Cookie] Set-Cookie 解析失败: {} ({})", header, e);
            return None;
        }
    };
    let request_host = url.host_str()?.to_ascii_lowercase();

    let (host, host_only) = match parsed.domain() {
        Some(domain) => {
            let domain = domain.to_ascii_lowercase();
            if !domain_matches(&request_host, &domain) {
                warn!(
                    "[Cookie] Domain={} 与请求主机 {} 不匹配，已拒绝",
                    domain, request_host
                );
                return None;
            }
            (domain, false)
        }
        None => (request_host, true),
    };

    let path = match parsed.path() {
        Some(p) if p.starts_with('/') => p.to_string(),
        _ => default_path(url),
    };

    let max_age = parsed.max_age().map(|age| {
        let secs = age.whole_seconds();
        if secs <= 0 {
            now
        } else {
            Duration::try_seconds(secs)
                .and_then(|d| now.checked_add_signed(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        }
    });
    let expires = parsed
        .expires_datetime()
        .and_then(|at| DateTime::<Utc>::from_timestamp(at.unix_timestamp(), at.nanosecond()));

    Some(StoredCookie {
        host,
        name: parsed.name().to_string(),
        value: parsed.value_trimmed().to_string(),
        path,
        secure: parsed.secure().unwrap_or(false),
        host_only,
        expires_at: max_age.or(expires),
    })
}

/// SDK 的 cookie 存储（host -> name -> cookie）
#[derive(Debug, Default)]
pub struct SessionCookieStore {
    cookies: RwLock<HashMap<String, HashMap<String, StoredCookie>>>,
    dirty: AtomicBool,
}

impl SessionCookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从持久化结果恢复，已过期的直接丢弃
    pub fn load(&self, cookies: Vec<StoredCookie>) {
        let now = Utc::now();
        let mut guard = self.cookies.write().unwrap_or_else(PoisonError::into_inner);
        for cookie in cookies.into_iter().filter(|c| !c.is_expired(now)) {
            guard
                .entry(cookie.host.clone())
                .or_default()
                .insert(cookie.name.clone(), cookie);
        }
    }

    /// 写入或删除一条 cookie（已过期即删除）
    pub fn insert(&self, cookie: StoredCookie) {
        let now = Utc::now();
        let mut guard = self.cookies.write().unwrap_or_else(PoisonError::into_inner);
        let jar = guard.entry(cookie.host.clone()).or_default();
        if cookie.is_expired(now) {
            debug!("[Cookie] 删除过期 cookie: {}@{}", cookie.name, cookie.host);
            jar.remove(&cookie.name);
        } else {
            debug!("[Cookie] 保存 cookie: {}@{}", cookie.name, cookie.host);
            jar.insert(cookie.name.clone(), cookie);
        }
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// 读取某个 URL 下指定名称的 cookie 值
    pub fn get(&self, url: &Url, name: &str) -> Option<String> {
        let header = self.header_for(url)?;
        get_cookie(&header, name)
    }

    /// 当前所有未过期 cookie 的快照
    pub fn snapshot(&self) -> Vec<StoredCookie> {
        let now = Utc::now();
        let guard = self.cookies.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .values()
            .flat_map(|jar| jar.values())
            .filter(|c| !c.is_expired(now))
            .cloned()
            .collect()
    }

    /// 读取并清除脏标记
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }

    fn header_for(&self, url: &Url) -> Option<String> {
        let now = Utc::now();
        let guard = self.cookies.read().unwrap_or_else(PoisonError::into_inner);
        let mut matched: Vec<&StoredCookie> = guard
            .values()
            .flat_map(|jar| jar.values())
            .filter(|c| !c.is_expired(now) && c.matches(url))
            .collect();
        if matched.is_empty() {
            return None;
        }
        // 路径更长的排在前面
        matched.sort_by(|a, b| b.path.len().cmp(&a.path.len()).then(a.name.cmp(&b.name)));
        let pairs: Vec<String> = matched
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        Some(pairs.join("; "))
    }
}

impl reqwest::cookie::CookieStore for SessionCookieStore {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let now = Utc::now();
        for header in cookie_headers {
            match header.to_str() {
                Ok(raw) => match parse_set_cookie(raw, url, now) {
                    Some(cookie) => self.insert(cookie),
                    None => warn!("[Cookie] 无法解析 Set-Cookie: {}", raw),
                },
                Err(_) => warn!("[Cookie] Set-Cookie 不是合法的 ASCII，已忽略"),
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.header_for(url)
            .and_then(|s| HeaderValue::from_str(&s).ok())
    }
}
