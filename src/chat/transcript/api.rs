//! 问答 HTTP API 客户端

use crate::chat::types::{handle_http_response, ChatMessage};
use anyhow::{Context, Result};
use futures_util::{Stream, StreamExt};
use tracing::{debug, error, info};
use uuid::Uuid;

/// 问答相关的 HTTP API 客户端
#[derive(Clone)]
pub struct ChatApi {
    client: reqwest::Client,
    api_base_url: String,
}

impl ChatApi {
    /// `client` 应该已经在外部配置好 cookie 存储
    pub fn new(client: reqwest::Client, api_base_url: String) -> Self {
        Self {
            client,
            api_base_url,
        }
    }

    /// 发送问题（POST /chat），返回模型回答
    pub async fn send_message(&self, content: &str) -> Result<ChatMessage> {
        let operation_id = Uuid::new_v4().to_string();
        let url = format!("{}/chat", self.api_base_url);

        info!("[ChatAPI] 📡 发送问题");
        debug!(
            "[ChatAPI]   请求URL: {}, 操作ID: {}, 内容: {}",
            url, operation_id, content
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("operationID", &operation_id)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .context("请求失败")?;

        let reply = handle_http_response::<ChatMessage>(response, "问答").await?;
        info!("[ChatAPI] ✅ 收到回答，{} 字符", reply.content.len());
        Ok(reply)
    }

    /// 流式发送问题（POST /stream），按到达顺序返回文本片段
    pub async fn stream_message(
        &self,
        content: &str,
    ) -> Result<impl Stream<Item = Result<String>>> {
        let operation_id = Uuid::new_v4().to_string();
        let url = format!("{}/stream", self.api_base_url);

        info!("[ChatAPI] 📡 流式发送问题");
        debug!("[ChatAPI]   请求URL: {}, 操作ID: {}", url, operation_id);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("operationID", &operation_id)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .context("请求失败")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(
                "[ChatAPI] 流式问答请求失败，HTTP状态: {}, 响应: {}",
                status, text
            );
            return Err(anyhow::anyhow!("HTTP 错误 {}: {}", status, text));
        }

        let mut decoder = Utf8ChunkDecoder::default();
        Ok(response.bytes_stream().map(move |chunk| -> Result<String> {
            let chunk = chunk.context("读取流式响应失败")?;
            Ok(decoder.push(&chunk))
        }))
    }
}

/// 把任意切分的字节流还原成 UTF-8 文本，跨片段的多字节字符会等到完整后再输出
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // 结尾是不完整的字符，留到下一段
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }
}
