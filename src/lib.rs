pub mod chat;

// 重新导出常用类型和函数，方便外部使用
pub use chat::{
    client::{ClientConfig, DocChatClient, SubmitOutcome},
    document::StagedDocument,
    listener::DocChatListener,
    transcript::PRESETS,
    types::{ChatMessage, MessageType, Session},
};
