//! 文档问答监听器回调接口
//!
//! 替代前端的渲染层：状态每次变化都会回调，列表参数为 JSON 数组字符串。

use async_trait::async_trait;

/// 文档问答监听器
#[async_trait]
pub trait DocChatListener: Send + Sync {
    /// 当前会话确定（身份解析、新建会话后）
    ///
    /// 参数 `session_cookie` 为会话 token
    async fn on_session_resolved(&self, session_cookie: String);

    /// 文档列表变化
    ///
    /// `confirmed_json` 为服务器确认的文档标识，`staged_json` 为待上传的文件名
    async fn on_documents_changed(&self, confirmed_json: String, staged_json: String);

    /// 上传状态变化（对应前端的 spinner）
    async fn on_upload_status_changed(&self, uploading: bool);

    /// 对话记录变化，参数为完整对话（包含待确认的提问）
    async fn on_transcript_changed(&self, transcript_json: String);

    /// 等待回答状态变化（为 true 时输入框应禁用）
    async fn on_awaiting_response_changed(&self, awaiting: bool);

    /// 流式回答的一段内容
    async fn on_stream_chunk(&self, chunk: String);

    /// 通知通道发出新通知
    async fn on_notification(&self, message: String);

    /// 临时提示（3 秒后自动消失）
    async fn on_advisory(&self, message: String);
}

/// 空实现（默认监听器）
pub struct EmptyDocChatListener;

#[async_trait]
impl DocChatListener for EmptyDocChatListener {
    async fn on_session_resolved(&self, _session_cookie: String) {}
    async fn on_documents_changed(&self, _confirmed_json: String, _staged_json: String) {}
    async fn on_upload_status_changed(&self, _uploading: bool) {}
    async fn on_transcript_changed(&self, _transcript_json: String) {}
    async fn on_awaiting_response_changed(&self, _awaiting: bool) {}
    async fn on_stream_chunk(&self, _chunk: String) {}
    async fn on_notification(&self, _message: String) {}
    async fn on_advisory(&self, _message: String) {}
}
