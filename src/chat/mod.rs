//! 文档问答 SDK 模块
//!
//! 访客身份解析、文档上传、问答对话以及 cookie 持久化

pub mod client;
pub mod cookie;
pub mod cookie_dao;
pub mod db;
pub mod document;
pub mod listener;
pub mod notification;
pub mod transcript;
pub mod types;
pub mod visitor;

#[cfg(test)]
pub(crate) mod mock_server;

// 重新导出主要类型和函数
pub use client::{ChatSnapshot, ChatState, ClientConfig, DocChatClient, SubmitOutcome};
pub use document::{StageOutcome, StagedDocument};
pub use listener::{DocChatListener, EmptyDocChatListener};
pub use types::{ChatMessage, MessageType, Session};
pub use visitor::IdentityStatus;
