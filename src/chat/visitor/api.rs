//! 访客 / 会话 HTTP API 客户端

use crate::chat::types::{handle_http_response, SessionsResp, VisitorResp};
use anyhow::{Context, Result};
use tracing::{debug, info};
use uuid::Uuid;

/// 访客和会话相关的 HTTP API 客户端
#[derive(Clone)]
pub struct VisitorApi {
    client: reqwest::Client,
    api_base_url: String,
}

impl VisitorApi {
    /// `client` 应该已经在外部配置好 cookie 存储
    pub fn new(client: reqwest::Client, api_base_url: String) -> Self {
        Self {
            client,
            api_base_url,
        }
    }

    /// 查询当前访客（GET /visitor）
    pub async fn get_visitor(&self) -> Result<VisitorResp> {
        let operation_id = Uuid::new_v4().to_string();
        let url = format!("{}/visitor", self.api_base_url);

        info!("[VisitorAPI] 📡 查询访客");
        debug!("[VisitorAPI]   请求URL: {}, 操作ID: {}", url, operation_id);

        let response = self
            .client
            .get(&url)
            .header("operationID", &operation_id)
            .send()
            .await
            .context("请求失败")?;

        let resp = handle_http_response::<VisitorResp>(response, "查询访客").await?;
        info!(
            "[VisitorAPI] ✅ 访客存在: {}, 会话数: {}",
            resp.exists,
            resp.sessions.len()
        );
        Ok(resp)
    }

    /// 注册访客（POST /visitor），服务器会下发新的 session cookie
    pub async fn register_visitor(&self) -> Result<VisitorResp> {
        let operation_id = Uuid::new_v4().to_string();
        let url = format!("{}/visitor", self.api_base_url);

        info!("[VisitorAPI] 📡 注册访客");
        debug!("[VisitorAPI]   请求URL: {}, 操作ID: {}", url, operation_id);

        let response = self
            .client
            .post(&url)
            .header("operationID", &operation_id)
            .send()
            .await
            .context("请求失败")?;

        let resp = handle_http_response::<VisitorResp>(response, "注册访客").await?;
        info!("[VisitorAPI] ✅ 注册完成，会话数: {}", resp.sessions.len());
        Ok(resp)
    }

    /// 新建会话（POST /session），返回访客的全部会话
    pub async fn create_session(&self) -> Result<SessionsResp> {
        let operation_id = Uuid::new_v4().to_string();
        let url = format!("{}/session", self.api_base_url);

        info!("[VisitorAPI] 📡 新建会话");
        debug!("[VisitorAPI]   请求URL: {}, 操作ID: {}", url, operation_id);

        let response = self
            .client
            .post(&url)
            .header("operationID", &operation_id)
            .send()
            .await
            .context("请求失败")?;

        let resp = handle_http_response::<SessionsResp>(response, "新建会话").await?;
        info!("[VisitorAPI] ✅ 新建会话完成，会话数: {}", resp.sessions.len());
        Ok(resp)
    }

    /// 查询当前会话（GET /session）
    pub async fn get_session(&self) -> Result<VisitorResp> {
        let operation_id = Uuid::new_v4().to_string();
        let url = format!("{}/session", self.api_base_url);

        info!("[VisitorAPI] 📡 查询会话");
        debug!("[VisitorAPI]   请求URL: {}, 操作ID: {}", url, operation_id);

        let response = self
            .client
            .get(&url)
            .header("operationID", &operation_id)
            .send()
            .await
            .context("请求失败")?;

        handle_http_response::<VisitorResp>(response, "查询会话").await
    }
}
