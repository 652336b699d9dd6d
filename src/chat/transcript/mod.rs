//! 对话模块
//!
//! 问答 API、对话记录和预设问题

pub mod api;
pub mod manager;
pub mod presets;

// 重新导出主要类型和函数
pub use api::ChatApi;
pub use manager::{PendingTicket, SubmitRejection, Transcript};
pub use presets::{Preset, PRESETS};
