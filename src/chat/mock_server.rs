//! 测试用的本地 LLM 服务器
//!
//! 用 axum 实现与真实服务器相同的路由和 cookie 行为，绑定 127.0.0.1 随机端口。

use crate::chat::cookie::get_cookie;
use crate::chat::types::{ChatMessage, Session, SESSION_COOKIE_NAME};
use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

/// 测试日志初始化，只执行一次
pub fn init_test_logger() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .init();
    });
}

/// 服务器状态，测试中可以随时修改
#[derive(Debug, Default)]
pub struct MockState {
    pub sessions: Vec<Session>,
    /// 是否已有访客（GET /visitor 带 cookie 时返回 exists）
    pub visitor_registered: bool,
    /// POST /visitor 不创建会话也不下发 cookie
    pub register_without_session: bool,
    pub fail_upload: bool,
    pub fail_clear: bool,
    pub fail_chat: bool,
    pub upload_delay: Option<Duration>,
    pub stream_chunks: Vec<String>,
    pub calls: Vec<String>,
    pub uploads: Vec<Vec<String>>,
    pub uploads_in_flight: usize,
    pub max_uploads_in_flight: usize,
    /// 下一个会话编号
    pub next_id: usize,
}

impl MockState {
    /// 已有访客和会话的服务器
    pub fn registered(sessions: Vec<Session>) -> Self {
        Self {
            sessions,
            visitor_registered: true,
            ..Self::default()
        }
    }

    pub fn session(token: &str, documents: &[&str], conversation: Vec<ChatMessage>) -> Session {
        Session {
            documents: documents.iter().map(|d| d.to_string()).collect(),
            conversation,
            session_cookie: token.to_string(),
        }
    }

    fn create_session(&mut self) -> String {
        self.next_id += 1;
        let token = format!("session-{}", self.next_id);
        self.sessions.push(Self::session(&token, &[], vec![]));
        token
    }

    fn session_mut(&mut self, token: Option<&str>) -> Option<&mut Session> {
        let token = token?;
        self.sessions.iter_mut().find(|s| s.session_cookie == token)
    }
}

#[derive(Clone)]
pub struct MockServer {
    state: Arc<Mutex<MockState>>,
}

impl MockServer {
    /// 启动服务器，返回句柄和基础地址
    pub async fn start(state: MockState) -> (Self, String) {
        let server = Self {
            state: Arc::new(Mutex::new(state)),
        };
        let app = Router::new()
            .route("/visitor", get(get_visitor).post(register_visitor))
            .route("/session", get(get_session).post(create_session))
            .route("/document", post(upload_documents).delete(clear_documents))
            .route("/chat", post(chat))
            .route("/stream", post(stream))
            .with_state(server.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (server, format!("http://{}", addr))
    }

    pub fn update(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.state.lock().unwrap());
    }

    /// 收到的请求，形如 `POST /visitor`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// 每次上传请求中的文件名
    pub fn uploads(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().uploads.clone()
    }

    /// 服务器端某个会话的文档
    pub fn session_documents(&self, token: &str) -> Vec<String> {
        let mut state = self.state.lock().unwrap();
        state
            .session_mut(Some(token))
            .map(|s| s.documents.clone())
            .unwrap_or_default()
    }

    pub fn max_concurrent_uploads(&self) -> usize {
        self.state.lock().unwrap().max_uploads_in_flight
    }

    fn record(&self, call: &str) -> std::sync::MutexGuard<'_, MockState> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.to_string());
        state
    }
}

fn request_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    get_cookie(raw, SESSION_COOKIE_NAME)
}

fn with_session_cookie(token: &str, body: serde_json::Value) -> Response {
    (
        [(
            header::SET_COOKIE,
            format!("{}={}; Path=/", SESSION_COOKIE_NAME, token),
        )],
        Json(body),
    )
        .into_response()
}

fn server_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
}

async fn get_visitor(State(server): State<MockServer>, headers: HeaderMap) -> Response {
    let state = server.record("GET /visitor");
    let exists = state.visitor_registered && request_cookie(&headers).is_some();
    let sessions = if exists { state.sessions.clone() } else { vec![] };
    Json(json!({ "exists": exists, "sessions": sessions })).into_response()
}

async fn register_visitor(State(server): State<MockServer>) -> Response {
    let mut state = server.record("POST /visitor");
    state.visitor_registered = true;
    if state.register_without_session {
        return Json(json!({ "exists": true, "sessions": [] })).into_response();
    }
    let token = state.create_session();
    let body = json!({ "exists": true, "sessions": state.sessions });
    with_session_cookie(&token, body)
}

async fn get_session(State(server): State<MockServer>, headers: HeaderMap) -> Response {
    let mut state = server.record("GET /session");
    let cookie = request_cookie(&headers);
    match state.session_mut(cookie.as_deref()) {
        Some(session) => {
            let session = session.clone();
            Json(json!({ "exists": true, "sessions": [session] })).into_response()
        }
        None => Json(json!({ "exists": false, "sessions": [] })).into_response(),
    }
}

async fn create_session(State(server): State<MockServer>) -> Response {
    let mut state = server.record("POST /session");
    let token = state.create_session();
    let body = json!({ "sessions": state.sessions });
    with_session_cookie(&token, body)
}

async fn upload_documents(
    State(server): State<MockServer>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let delay = {
        let mut state = server.record("POST /document");
        state.uploads_in_flight += 1;
        state.max_uploads_in_flight = state.max_uploads_in_flight.max(state.uploads_in_flight);
        state.upload_delay
    };

    let mut names = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("files") {
            continue;
        }
        let name = field.file_name().unwrap_or("unnamed").to_string();
        let _ = field.bytes().await;
        names.push(name);
    }
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let mut state = server.state.lock().unwrap();
    state.uploads_in_flight -= 1;
    if state.fail_upload {
        return server_error();
    }
    state.uploads.push(names.clone());
    let cookie = request_cookie(&headers);
    match state.session_mut(cookie.as_deref()) {
        Some(session) => {
            session.documents.extend(names.iter().cloned());
            Json(json!({ "documents": names })).into_response()
        }
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn clear_documents(State(server): State<MockServer>, headers: HeaderMap) -> Response {
    let mut state = server.record("DELETE /document");
    if state.fail_clear {
        return server_error();
    }
    if let Some(session) = state.session_mut(request_cookie(&headers).as_deref()) {
        session.documents.clear();
    }
    "Documents cleared".into_response()
}

async fn chat(
    State(server): State<MockServer>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let mut state = server.record("POST /chat");
    if state.fail_chat {
        return server_error();
    }
    let content = body["content"].as_str().unwrap_or_default().to_string();
    let reply = ChatMessage::ai(format!("Answer to: {}", content));
    if let Some(session) = state.session_mut(request_cookie(&headers).as_deref()) {
        session.conversation.push(ChatMessage::human(content));
        session.conversation.push(reply.clone());
    }
    Json(reply).into_response()
}

async fn stream(State(server): State<MockServer>) -> Response {
    let chunks = {
        let state = server.record("POST /stream");
        if state.fail_chat {
            return server_error();
        }
        state.stream_chunks.clone()
    };
    let chunks = futures_util::stream::iter(chunks.into_iter().map(Ok::<_, Infallible>));
    Body::from_stream(chunks).into_response()
}
