//! 访客模块
//!
//! 访客 / 会话 API 以及 session cookie 与服务器会话的匹配

pub mod api;
pub mod resolver;

// 重新导出主要类型和函数
pub use api::VisitorApi;
pub use resolver::{select_session, IdentityState, IdentityStatus, SessionMatch};
