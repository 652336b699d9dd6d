use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// 会话 cookie 名称（服务器通过 Set-Cookie 下发）
pub const SESSION_COOKIE_NAME: &str = "session-cookie";

/// 通用的服务端错误提示（不暴露错误码和细节）
pub const GENERIC_ERROR_NOTICE: &str = "There has been an error on the server, please try again.";

/// 聊天消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    /// 用户提问
    #[serde(rename = "HumanMessage")]
    Human,
    /// 模型回答
    #[serde(rename = "AIMessage")]
    Ai,
}

/// 聊天消息（与服务器 `{ type, content }` 结构对应）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub content: String,
}

impl ChatMessage {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            message_type: MessageType::Human,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            message_type: MessageType::Ai,
            content: content.into(),
        }
    }

    /// 按换行拆分内容，每一行单独展示
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.content.split('\n')
    }
}

/// 服务器端会话
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// 已上传的文档标识
    #[serde(default)]
    pub documents: Vec<String>,
    /// 对话记录
    #[serde(default)]
    pub conversation: Vec<ChatMessage>,
    /// 会话 token，与 cookie 值一致
    #[serde(rename = "sessionCookie", default)]
    pub session_cookie: String,
}

/// `/visitor` 和 `GET /session` 的响应
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisitorResp {
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

/// `POST /session` 的响应
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionsResp {
    #[serde(default)]
    pub sessions: Vec<Session>,
}

/// `POST /document` 的响应
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResp {
    #[serde(default)]
    pub documents: Vec<String>,
}

/// 通用 HTTP 响应处理函数：检查状态码并反序列化 body
///
/// 服务器直接返回业务 JSON（没有 errCode 包装），非 2xx 状态一律视为失败。
pub async fn handle_http_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    operation_name: &str,
) -> anyhow::Result<T> {
    use anyhow::Context;

    let status = response.status();

    // body 只能读取一次
    let body_bytes = response.bytes().await.context("读取响应 body 失败")?;
    let body_str = String::from_utf8_lossy(&body_bytes);
    info!("[HTTP] {}响应 Body: {}", operation_name, body_str);

    if !status.is_success() {
        error!(
            "[HTTP] {}请求失败，HTTP状态: {}, 响应: {}",
            operation_name, status, body_str
        );
        return Err(anyhow::anyhow!("HTTP 错误 {}: {}", status, body_str));
    }
    debug!("[HTTP] {}请求成功，HTTP状态: {}", operation_name, status);

    serde_json::from_slice::<T>(&body_bytes).map_err(|e| {
        error!(
            "[HTTP] {}反序列化失败: {:?}\n原始响应: {}",
            operation_name, e, body_str
        );
        anyhow::anyhow!("反序列化响应失败: {:?}", e)
    })
}
