//! 文档 HTTP API 客户端
//!
//! 负责文档上传（multipart）和清空

use crate::chat::document::models::StagedDocument;
use crate::chat::types::{handle_http_response, UploadResp};
use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use tracing::{debug, error, info};
use uuid::Uuid;

/// 文档相关的 HTTP API 客户端
#[derive(Clone)]
pub struct DocumentApi {
    client: reqwest::Client,
    api_base_url: String,
}

impl DocumentApi {
    /// `client` 应该已经在外部配置好 cookie 存储
    pub fn new(client: reqwest::Client, api_base_url: String) -> Self {
        Self {
            client,
            api_base_url,
        }
    }

    /// 一次请求上传整批文件（字段名 `files`，可重复），返回服务器分配的文档标识
    pub async fn upload_documents(&self, files: &[StagedDocument]) -> Result<Vec<String>> {
        let operation_id = Uuid::new_v4().to_string();
        let url = format!("{}/document", self.api_base_url);

        info!("[DocAPI] 📡 上传 {} 个文件", files.len());
        debug!("[DocAPI]   请求URL: {}, 操作ID: {}", url, operation_id);

        let mut form = Form::new();
        for file in files {
            debug!(
                "[DocAPI]   文件: {} ({} 字节)",
                file.file_name,
                file.bytes.len()
            );
            let mime = if file.is_pdf() {
                "application/pdf"
            } else {
                "application/octet-stream"
            };
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(mime)
                .context("无效的 MIME 类型")?;
            form = form.part("files", part);
        }

        let response = self
            .client
            .post(&url)
            .header("operationID", &operation_id)
            .multipart(form)
            .send()
            .await
            .context("请求失败")?;

        let resp = handle_http_response::<UploadResp>(response, "上传文档").await?;
        info!("[DocAPI] ✅ 上传完成，文档: {:?}", resp.documents);
        Ok(resp.documents)
    }

    /// 删除当前会话的全部文档（DELETE /document），只关心状态码
    pub async fn clear_documents(&self) -> Result<()> {
        let operation_id = Uuid::new_v4().to_string();
        let url = format!("{}/document", self.api_base_url);

        info!("[DocAPI] 📡 清空文档");
        debug!("[DocAPI]   请求URL: {}, 操作ID: {}", url, operation_id);

        let response = self
            .client
            .delete(&url)
            .header("operationID", &operation_id)
            .send()
            .await
            .context("请求失败")?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            error!(
                "[DocAPI] 清空文档失败，HTTP状态: {}, 响应: {}",
                status, text
            );
            return Err(anyhow::anyhow!("HTTP 错误 {}: {}", status, text));
        }
        info!("[DocAPI] ✅ 清空文档完成: {}", text);
        Ok(())
    }
}
