//! 文档问答客户端核心实现模块
//!
//! [`DocChatClient`] 是唯一的顶层状态容器：身份解析、文档登记、对话记录、通知通道
//! 都收在 [`ChatState`] 中，只能通过客户端的方法修改。锁不会跨越网络请求持有，
//! 请求进行期间其他操作照常处理。

use crate::chat::cookie::{SessionCookieStore, StoredCookie};
use crate::chat::cookie_dao::CookieDao;
use crate::chat::db::create_sqlite_pool_with_migration;
use crate::chat::document::{DocumentApi, DocumentRegistry, StageOutcome, StagedDocument};
use crate::chat::listener::{DocChatListener, EmptyDocChatListener};
use crate::chat::notification::{Advisory, NotificationChannel, UPLOAD_FIRST_ADVISORY};
use crate::chat::transcript::{ChatApi, PendingTicket, Preset, SubmitRejection, Transcript};
use crate::chat::types::{ChatMessage, Session, GENERIC_ERROR_NOTICE, SESSION_COOKIE_NAME};
use crate::chat::visitor::{select_session, IdentityState, IdentityStatus, SessionMatch, VisitorApi};
use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// 客户端配置
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// LLM 服务器基础地址
    pub api_base_url: String,
    /// cookie 持久化使用的 SQLite URL，None 表示只保存在内存
    ///
    /// 例如：`sqlite://docchat.db?mode=rwc`
    pub cookie_db_url: Option<String>,
    /// 是否只接受 PDF（所有暂存入口统一过滤）
    pub pdf_only: bool,
    /// 请求超时，None 表示不设超时
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    /// 创建默认配置
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            cookie_db_url: None,
            pdf_only: true,
            request_timeout: None,
        }
    }

    /// 从环境变量读取：`DOCCHAT_SERVER`、`DOCCHAT_COOKIE_DB`
    pub fn from_env() -> Self {
        let server =
            std::env::var("DOCCHAT_SERVER").unwrap_or_else(|_| "http://localhost:8000".to_string());
        let mut config = Self::new(server);
        config.cookie_db_url = std::env::var("DOCCHAT_COOKIE_DB")
            .ok()
            .filter(|s| !s.is_empty());
        config
    }
}

/// 客户端全部状态
#[derive(Debug)]
pub struct ChatState {
    pub identity: IdentityState,
    pub documents: DocumentRegistry,
    pub transcript: Transcript,
    pub notification: NotificationChannel,
    pub advisory: Advisory,
}

impl ChatState {
    fn new(pdf_only: bool) -> Self {
        Self {
            identity: IdentityState::default(),
            documents: DocumentRegistry::new(pdf_only),
            transcript: Transcript::new(),
            notification: NotificationChannel::default(),
            advisory: Advisory::default(),
        }
    }
}

/// 状态快照（只读，用于展示）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSnapshot {
    pub identity_status: IdentityStatus,
    pub session_cookie: Option<String>,
    pub confirmed_documents: Vec<String>,
    pub staged_documents: Vec<String>,
    pub uploading: bool,
    pub transcript: Vec<ChatMessage>,
    pub draft: String,
    pub awaiting_response: bool,
    pub notification: Option<String>,
    pub advisory: Option<String>,
}

/// 提问结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// 输入为空，什么也没做
    Ignored,
    /// 没有已上传的文档，已显示临时提示
    NeedsDocuments,
    /// 上一个问题还在等待回答
    Busy,
    /// 收到回答
    Answered(ChatMessage),
    /// 回答到达前会话已切换，回答被丢弃
    Discarded,
}

/// 身份解析结果
enum Resolution {
    Adopted(Session),
    Fault(String),
}

/// 文档问答客户端
#[derive(Clone)]
pub struct DocChatClient {
    config: ClientConfig,
    base_url: Url,
    cookies: Arc<SessionCookieStore>,
    cookie_dao: Option<CookieDao>,
    visitor_api: VisitorApi,
    document_api: DocumentApi,
    chat_api: ChatApi,
    state: Arc<Mutex<ChatState>>,
    /// 上传和清空串行执行
    upload_gate: Arc<Mutex<()>>,
    listener: Arc<dyn DocChatListener>,
}

impl DocChatClient {
    /// 创建客户端（cookie 只保存在内存）
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.api_base_url)
            .context(format!("无效的服务器地址: {}", config.api_base_url))?;
        if base_url.host_str().is_none() {
            return Err(anyhow::anyhow!(
                "服务器地址缺少主机名: {}",
                config.api_base_url
            ));
        }

        let cookies = Arc::new(SessionCookieStore::new());
        let mut builder = reqwest::ClientBuilder::new().cookie_provider(cookies.clone());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().context("创建 HTTP 客户端失败")?;

        let api_base_url = config.api_base_url.clone();
        Ok(Self {
            visitor_api: VisitorApi::new(http_client.clone(), api_base_url.clone()),
            document_api: DocumentApi::new(http_client.clone(), api_base_url.clone()),
            chat_api: ChatApi::new(http_client, api_base_url),
            state: Arc::new(Mutex::new(ChatState::new(config.pdf_only))),
            upload_gate: Arc::new(Mutex::new(())),
            listener: Arc::new(EmptyDocChatListener),
            cookie_dao: None,
            cookies,
            base_url,
            config,
        })
    }

    /// 创建客户端，并按配置打开 cookie 数据库、恢复已保存的 cookie
    pub async fn build(config: ClientConfig) -> Result<Self> {
        let mut client = Self::new(config)?;
        if let Some(db_url) = client.config.cookie_db_url.clone() {
            let pool = create_sqlite_pool_with_migration(&db_url).await?;
            let dao = CookieDao::new(pool);
            let stored = dao.load_all().await?;
            info!("[Client] 🍪 恢复 {} 条 cookie", stored.len());
            client.cookies.load(stored);
            client.cookie_dao = Some(dao);
        }
        Ok(client)
    }

    /// 注册监听器
    pub fn set_listener(&mut self, listener: Arc<dyn DocChatListener>) {
        self.listener = listener;
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// 当前 session cookie
    pub fn session_cookie(&self) -> Option<String> {
        self.cookies.get(&self.base_url, SESSION_COOKIE_NAME)
    }

    /// 手动写入 session cookie（例如沿用已知会话）
    pub async fn set_session_cookie(&self, token: impl Into<String>) {
        let host = self.base_url.host_str().unwrap_or_default().to_ascii_lowercase();
        self.cookies
            .insert(StoredCookie::session(host, SESSION_COOKIE_NAME, token));
        self.persist_cookies().await;
    }

    // ========== 身份解析 ==========

    /// 启动时解析访客身份并加载会话
    pub async fn init(&self) -> Result<Session> {
        info!("[Client] 🚀 解析访客身份");
        let result = self.resolve_identity().await;
        self.persist_cookies().await;
        self.finish_resolution(result).await
    }

    /// 新建会话并切换过去
    pub async fn new_session(&self) -> Result<Session> {
        info!("[Client] 🆕 新建会话");
        let result = match self.visitor_api.create_session().await {
            Ok(resp) => self.reconcile(resp.sessions, true).await,
            Err(e) => Err(e),
        };
        self.persist_cookies().await;
        self.finish_resolution(result).await
    }

    /// 向服务器查询当前会话，刷新已确认文档；会话不存在时新建
    pub async fn refresh_session(&self) -> Result<()> {
        info!("[Client] 🔄 刷新会话");
        let resp = match self.visitor_api.get_session().await {
            Ok(resp) => resp,
            Err(e) => {
                self.report_failure("刷新会话", &e).await;
                return Err(e);
            }
        };
        self.persist_cookies().await;

        match resp.sessions.into_iter().next() {
            Some(session) if resp.exists => {
                {
                    let mut state = self.state.lock().await;
                    state.documents.refresh_confirmed(session.documents);
                }
                self.emit_documents().await;
                Ok(())
            }
            _ => {
                info!("[Client] 服务器没有当前会话，新建");
                self.new_session().await.map(|_| ())
            }
        }
    }

    async fn resolve_identity(&self) -> Result<Resolution> {
        match self.session_cookie() {
            None => {
                info!("[Identity] 没有 session cookie，注册访客");
                let visitor = self.visitor_api.register_visitor().await?;
                self.reconcile(visitor.sessions, true).await
            }
            Some(cookie) => {
                debug!("[Identity] 本地 session cookie: {}", cookie);
                let visitor = self.visitor_api.get_visitor().await?;
                if visitor.exists {
                    self.reconcile(visitor.sessions, false).await
                } else {
                    info!("[Identity] 服务器不认识该访客，重新注册");
                    let visitor = self.visitor_api.register_visitor().await?;
                    self.reconcile(visitor.sessions, true).await
                }
            }
        }
    }

    /// 用当前 cookie 匹配会话；没有匹配时当作没有会话，最多重新注册一次
    async fn reconcile(&self, mut sessions: Vec<Session>, mut registered: bool) -> Result<Resolution> {
        loop {
            let cookie = self.session_cookie();
            match select_session(cookie.as_deref(), &sessions) {
                SessionMatch::Matched(session) => return Ok(Resolution::Adopted(session)),
                SessionMatch::Ambiguous(count) => {
                    return Ok(Resolution::Fault(format!(
                        "{} 个会话使用同一个 token",
                        count
                    )))
                }
                SessionMatch::NoCookie | SessionMatch::Unknown if !registered => {
                    warn!("[Identity] ⚠️ cookie 无法匹配会话，按无会话处理，重新注册访客");
                    sessions = self.visitor_api.register_visitor().await?.sessions;
                    self.persist_cookies().await;
                    registered = true;
                }
                other => {
                    return Ok(Resolution::Fault(format!(
                        "注册后仍无法确定会话: {:?}",
                        other
                    )))
                }
            }
        }
    }

    async fn finish_resolution(&self, result: Result<Resolution>) -> Result<Session> {
        match result {
            Ok(Resolution::Adopted(session)) => {
                self.adopt_session(session.clone()).await;
                Ok(session)
            }
            Ok(Resolution::Fault(reason)) => {
                error!("[Identity] ❌ 会话一致性错误: {}", reason);
                {
                    let mut state = self.state.lock().await;
                    state.identity.fault();
                    state.notification.raise(GENERIC_ERROR_NOTICE);
                }
                self.listener
                    .on_notification(GENERIC_ERROR_NOTICE.to_string())
                    .await;
                Err(anyhow::anyhow!("会话一致性错误: {}", reason))
            }
            Err(e) => {
                self.report_failure("身份解析", &e).await;
                Err(e)
            }
        }
    }

    /// 会话成为新的基线：覆盖本地文档和对话
    async fn adopt_session(&self, session: Session) {
        info!(
            "[Client] ✅ 当前会话: {}（文档 {} 个，消息 {} 条）",
            session.session_cookie,
            session.documents.len(),
            session.conversation.len()
        );
        {
            let mut state = self.state.lock().await;
            state.documents.replace_baseline(session.documents.clone());
            state.transcript.replace(session.conversation.clone());
            state.identity.adopt(session.clone());
        }
        self.listener
            .on_session_resolved(session.session_cookie)
            .await;
        self.emit_documents().await;
        self.emit_transcript().await;
    }

    // ========== 文档 ==========

    /// 暂存文件并上传
    ///
    /// 上传与清空共用一把门锁，同一时间只有一个请求在改动服务器上的文档。
    /// 已有一批在上传时，本次调用先等它结束，再发送待上传列表中剩下的文件
    /// （前一批失败退回的文件也会一起发送）。因此每次调用都会亲自尝试自己的文件：
    /// 返回 `Ok` 时它们已被服务器确认（期间会话被替换、文件被丢弃的情况除外），
    /// 失败时错误返回给本次调用，文件留在待上传列表。
    pub async fn stage_documents(&self, files: Vec<StagedDocument>) -> Result<StageOutcome> {
        let outcome = {
            let mut state = self.state.lock().await;
            state.documents.stage(files)
        };
        if outcome.accepted.is_empty() {
            debug!("[Client] 没有可上传的文件");
            return Ok(outcome);
        }
        self.emit_documents().await;
        self.upload_staged().await?;
        Ok(outcome)
    }

    /// 重新上传之前失败、仍在待上传列表中的文件
    pub async fn retry_uploads(&self) -> Result<()> {
        self.upload_staged().await
    }

    async fn upload_staged(&self) -> Result<()> {
        let _gate = self.upload_gate.lock().await;
        let batch = {
            let mut state = self.state.lock().await;
            state.documents.begin_upload()
        };
        let batch = match batch {
            Some(batch) => batch,
            None => {
                debug!("[Client] 待上传列表已由其他调用发送");
                return Ok(());
            }
        };

        self.listener.on_upload_status_changed(true).await;
        let result = self.document_api.upload_documents(&batch.files).await;
        self.persist_cookies().await;

        let failure = {
            let mut state = self.state.lock().await;
            match result {
                Ok(documents) => {
                    state.documents.complete_upload(batch, documents);
                    None
                }
                Err(e) => {
                    state.documents.fail_upload(batch);
                    Some(e)
                }
            }
        };
        self.listener.on_upload_status_changed(false).await;
        self.emit_documents().await;

        match failure {
            Some(e) => {
                self.report_failure("上传文档", &e).await;
                Err(e)
            }
            None => Ok(()),
        }
    }

    /// 删除服务器上的全部文档；只有服务器确认后才清空本地列表
    ///
    /// 正在进行的上传会先完成，避免服务器在清空之后又收下旧文件。
    pub async fn clear_documents(&self) -> Result<()> {
        let _gate = self.upload_gate.lock().await;
        match self.document_api.clear_documents().await {
            Ok(()) => {
                self.persist_cookies().await;
                {
                    let mut state = self.state.lock().await;
                    state.documents.apply_clear();
                }
                self.emit_documents().await;
                Ok(())
            }
            Err(e) => {
                self.report_failure("清空文档", &e).await;
                Err(e)
            }
        }
    }

    // ========== 对话 ==========

    /// 修改输入框内容
    pub async fn set_draft(&self, text: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.transcript.set_draft(text);
    }

    /// 把预设问题填入输入框
    pub async fn apply_preset(&self, index: usize) -> Option<Preset> {
        let mut state = self.state.lock().await;
        state.transcript.apply_preset(index).copied()
    }

    /// 提交输入框中的问题
    pub async fn submit_draft(&self) -> Result<SubmitOutcome> {
        let draft = {
            let state = self.state.lock().await;
            state.transcript.draft().to_string()
        };
        self.submit(&draft).await
    }

    /// 提问：问题立即显示，收到回答后追加回答
    pub async fn submit(&self, text: &str) -> Result<SubmitOutcome> {
        let ticket = match self.begin_submit(text).await {
            Ok(ticket) => ticket,
            Err(outcome) => return Ok(outcome),
        };
        let result = self.chat_api.send_message(&ticket.content).await;
        self.persist_cookies().await;
        self.finish_submit(ticket, result).await
    }

    /// 流式提问：回答片段实时回调给监听器，结束后拼接为完整回答
    pub async fn submit_streaming(&self, text: &str) -> Result<SubmitOutcome> {
        let ticket = match self.begin_submit(text).await {
            Ok(ticket) => ticket,
            Err(outcome) => return Ok(outcome),
        };

        let content = ticket.content.clone();
        let stream = match self.chat_api.stream_message(&content).await {
            Ok(stream) => stream,
            Err(e) => return self.finish_submit(ticket, Err(e)).await,
        };
        let mut stream = Box::pin(stream);

        let mut answer = String::new();
        let mut failure = None;
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(text) if text.is_empty() => {}
                Ok(text) => {
                    self.listener.on_stream_chunk(text.clone()).await;
                    answer.push_str(&text);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        drop(stream);
        self.persist_cookies().await;

        let result = match failure {
            Some(e) => Err(e),
            None => Ok(ChatMessage::ai(answer)),
        };
        self.finish_submit(ticket, result).await
    }

    async fn begin_submit(&self, text: &str) -> Result<PendingTicket, SubmitOutcome> {
        let decision = {
            let mut state = self.state.lock().await;
            let has_documents = !state.documents.confirmed().is_empty();
            let decision = state.transcript.begin_submit(text, has_documents);
            if decision == Err(SubmitRejection::NoDocuments) {
                state.advisory.show(UPLOAD_FIRST_ADVISORY);
            }
            decision
        };

        match decision {
            Ok(ticket) => {
                info!("[Client] 💬 提问: {}", ticket.content);
                self.emit_transcript().await;
                Ok(ticket)
            }
            Err(SubmitRejection::Empty) => Err(SubmitOutcome::Ignored),
            Err(SubmitRejection::Busy) => Err(SubmitOutcome::Busy),
            Err(SubmitRejection::NoDocuments) => {
                self.listener
                    .on_advisory(UPLOAD_FIRST_ADVISORY.to_string())
                    .await;
                Err(SubmitOutcome::NeedsDocuments)
            }
        }
    }

    async fn finish_submit(
        &self,
        ticket: PendingTicket,
        result: Result<ChatMessage>,
    ) -> Result<SubmitOutcome> {
        match result {
            Ok(reply) => {
                let applied = {
                    let mut state = self.state.lock().await;
                    state.transcript.confirm(&ticket, reply.clone())
                };
                if !applied {
                    return Ok(SubmitOutcome::Discarded);
                }
                self.emit_transcript().await;
                Ok(SubmitOutcome::Answered(reply))
            }
            Err(e) => {
                let rolled_back = {
                    let mut state = self.state.lock().await;
                    state.transcript.rollback(&ticket)
                };
                if rolled_back {
                    self.emit_transcript().await;
                }
                self.report_failure("问答", &e).await;
                Err(e)
            }
        }
    }

    // ========== 通知 ==========

    /// 用户关闭通知
    pub async fn dismiss_notification(&self) {
        let mut state = self.state.lock().await;
        state.notification.dismiss();
    }

    async fn report_failure(&self, operation: &str, e: &anyhow::Error) {
        error!("[Client] ❌ {}失败: {:#}", operation, e);
        {
            let mut state = self.state.lock().await;
            state.notification.raise(GENERIC_ERROR_NOTICE);
        }
        self.listener
            .on_notification(GENERIC_ERROR_NOTICE.to_string())
            .await;
    }

    // ========== 状态读取 ==========

    pub async fn snapshot(&self) -> ChatSnapshot {
        let state = self.state.lock().await;
        ChatSnapshot {
            identity_status: state.identity.status.clone(),
            session_cookie: state.identity.session_cookie().map(str::to_string),
            confirmed_documents: state.documents.confirmed().to_vec(),
            staged_documents: state.documents.staged_names(),
            uploading: state.documents.is_uploading(),
            transcript: state.transcript.view(),
            draft: state.transcript.draft().to_string(),
            awaiting_response: state.transcript.awaiting_response(),
            notification: state
                .notification
                .is_visible()
                .then(|| state.notification.signal().to_string()),
            advisory: state.advisory.message().map(str::to_string),
        }
    }

    pub async fn active_session(&self) -> Option<Session> {
        self.state.lock().await.identity.active.clone()
    }

    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.state.lock().await.transcript.view()
    }

    pub async fn confirmed_documents(&self) -> Vec<String> {
        self.state.lock().await.documents.confirmed().to_vec()
    }

    // ========== 内部工具 ==========

    async fn emit_documents(&self) {
        let (confirmed, staged) = {
            let state = self.state.lock().await;
            (
                state.documents.confirmed().to_vec(),
                state.documents.staged_names(),
            )
        };
        self.listener
            .on_documents_changed(
                serde_json::to_string(&confirmed).unwrap_or_default(),
                serde_json::to_string(&staged).unwrap_or_default(),
            )
            .await;
    }

    async fn emit_transcript(&self) {
        let (view, awaiting) = {
            let state = self.state.lock().await;
            (
                state.transcript.view(),
                state.transcript.awaiting_response(),
            )
        };
        self.listener
            .on_transcript_changed(serde_json::to_string(&view).unwrap_or_default())
            .await;
        self.listener.on_awaiting_response_changed(awaiting).await;
    }

    /// 有变化时把 cookie 写入数据库；失败只记录日志
    async fn persist_cookies(&self) {
        let dao = match &self.cookie_dao {
            Some(dao) => dao,
            None => return,
        };
        if !self.cookies.take_dirty() {
            return;
        }
        if let Err(e) = dao.replace_all(&self.cookies.snapshot()).await {
            warn!("[Client] 保存 cookie 失败: {:#}", e);
        }
    }
}
