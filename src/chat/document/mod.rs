//! 文档模块
//!
//! 本地暂存、批量上传和清空文档

pub mod api;
pub mod models;
pub mod registry;

// 重新导出主要类型和函数
pub use api::DocumentApi;
pub use models::{StageOutcome, StagedDocument, UploadBatch};
pub use registry::DocumentRegistry;
