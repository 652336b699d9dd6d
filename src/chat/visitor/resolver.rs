//! 会话匹配规则
//!
//! 用 cookie 中的 session token 在服务器返回的会话列表里查找当前会话。
//! token 唯一，因此多于一个匹配视为数据错误，不会默默取第一个。

use crate::chat::types::Session;
use tracing::{error, info, warn};

/// 匹配结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMatch {
    /// 本地没有 session cookie
    NoCookie,
    /// 恰好一个会话匹配
    Matched(Session),
    /// cookie 指向服务器不认识的会话
    Unknown,
    /// 多个会话 token 相同
    Ambiguous(usize),
}

/// 根据 cookie 从会话列表中选出当前会话
pub fn select_session(cookie: Option<&str>, sessions: &[Session]) -> SessionMatch {
    let cookie = match cookie {
        Some(c) if !c.is_empty() => c,
        _ => {
            info!("[Identity] 本地没有 session cookie");
            return SessionMatch::NoCookie;
        }
    };

    let mut matches = sessions.iter().filter(|s| s.session_cookie == cookie);
    match (matches.next(), matches.next()) {
        (Some(session), None) => {
            info!("[Identity] ✅ 匹配到会话: {}", cookie);
            SessionMatch::Matched(session.clone())
        }
        (None, _) => {
            warn!(
                "[Identity] ⚠️ cookie 在 {} 个会话中没有匹配: {}",
                sessions.len(),
                cookie
            );
            SessionMatch::Unknown
        }
        (Some(_), Some(_)) => {
            let count = sessions.iter().filter(|s| s.session_cookie == cookie).count();
            error!("[Identity] ❌ {} 个会话使用同一个 token: {}", count, cookie);
            SessionMatch::Ambiguous(count)
        }
    }
}

/// 身份解析状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IdentityStatus {
    /// 尚未解析（或解析失败，界面保持空状态）
    #[default]
    Unresolved,
    /// 已确定当前会话
    Resolved,
    /// 解析出现一致性错误
    Faulted,
}

/// 当前访客的身份状态
#[derive(Debug, Clone, Default)]
pub struct IdentityState {
    pub status: IdentityStatus,
    pub active: Option<Session>,
}

impl IdentityState {
    pub fn adopt(&mut self, session: Session) {
        self.status = IdentityStatus::Resolved;
        self.active = Some(session);
    }

    pub fn fault(&mut self) {
        self.status = IdentityStatus::Faulted;
        self.active = None;
    }

    pub fn session_cookie(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.session_cookie.as_str())
    }
}
