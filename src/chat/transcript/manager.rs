//! 对话记录管理
//!
//! 提问先放进唯一的待确认槽位（乐观展示），收到回答后与回答一起按顺序追加；
//! 失败时回滚，问题文本还给输入框。会话切换时整体替换，并丢弃过期的回答。

use crate::chat::transcript::presets::{preset, Preset};
use crate::chat::types::ChatMessage;
use tracing::{debug, info, warn};

/// 提问不能发出的原因（本地前置条件，不走通知通道）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    /// 输入为空
    Empty,
    /// 还没有已确认的文档
    NoDocuments,
    /// 上一个问题还在等待回答
    Busy,
}

/// 已发出的提问凭证
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTicket {
    pub generation: u64,
    pub content: String,
}

/// 对话记录
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    pending: Option<ChatMessage>,
    draft: String,
    generation: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已确认的消息
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// 展示用的完整对话：已确认消息 + 待确认提问
    pub fn view(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .chain(self.pending.iter())
            .cloned()
            .collect()
    }

    /// 是否在等待回答（输入框禁用）
    pub fn awaiting_response(&self) -> bool {
        self.pending.is_some()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// 预设问题只填入输入框，需要再次提交
    pub fn apply_preset(&mut self, index: usize) -> Option<&'static Preset> {
        let preset = preset(index)?;
        debug!("[Transcript] 填入预设问题: {}", preset.title);
        self.draft = preset.content.to_string();
        Some(preset)
    }

    /// 尝试发出提问：成功时提问进入待确认槽位、输入框清空
    pub fn begin_submit(
        &mut self,
        text: &str,
        has_documents: bool,
    ) -> Result<PendingTicket, SubmitRejection> {
        if text.is_empty() {
            return Err(SubmitRejection::Empty);
        }
        if !has_documents {
            info!("[Transcript] 没有已上传的文档，拒绝提问");
            return Err(SubmitRejection::NoDocuments);
        }
        if self.pending.is_some() {
            debug!("[Transcript] 上一个问题还在等待回答");
            return Err(SubmitRejection::Busy);
        }

        self.pending = Some(ChatMessage::human(text));
        self.draft.clear();
        Ok(PendingTicket {
            generation: self.generation,
            content: text.to_string(),
        })
    }

    /// 收到回答：提问和回答按顺序追加。过期的回答被丢弃并返回 false
    pub fn confirm(&mut self, ticket: &PendingTicket, reply: ChatMessage) -> bool {
        if ticket.generation != self.generation {
            warn!(
                "[Transcript] 丢弃过期回答（代数 {} != {}）",
                ticket.generation, self.generation
            );
            return false;
        }
        let question = self
            .pending
            .take()
            .unwrap_or_else(|| ChatMessage::human(ticket.content.clone()));
        self.messages.push(question);
        self.messages.push(reply);
        true
    }

    /// 提问失败：移除待确认提问，把文本还给输入框
    pub fn rollback(&mut self, ticket: &PendingTicket) -> bool {
        if ticket.generation != self.generation {
            return false;
        }
        warn!("[Transcript] 提问失败，回滚: {}", ticket.content);
        self.pending = None;
        if self.draft.is_empty() {
            self.draft = ticket.content.clone();
        }
        true
    }

    /// 用服务器会话整体替换对话（丢弃待确认提问）
    pub fn replace(&mut self, conversation: Vec<ChatMessage>) {
        if self.pending.is_some() {
            warn!("[Transcript] 会话切换，丢弃待确认提问");
        }
        self.generation += 1;
        self.messages = conversation;
        self.pending = None;
    }
}
