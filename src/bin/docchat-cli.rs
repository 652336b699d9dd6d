//! 文档问答 CLI 客户端
//!
//! 非交互式 CLI：解析访客身份，按参数上传文档、提问，并输出所有状态变化

use anyhow::Result;
use clap::Parser;
use docchat_sdk_core_rust::chat::listener::DocChatListener;
use docchat_sdk_core_rust::chat::transcript::PRESETS;
use docchat_sdk_core_rust::{ClientConfig, DocChatClient, StagedDocument, SubmitOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// 文档问答 CLI 客户端
#[derive(Parser, Debug)]
#[command(name = "docchat-cli")]
#[command(about = "文档问答 CLI 客户端 - 上传 PDF 并针对文档提问", long_about = None)]
struct Args {
    /// LLM 服务器地址
    #[arg(short, long, env = "DOCCHAT_SERVER", default_value = "http://localhost:8000")]
    server: String,

    /// cookie 数据库（SQLite URL），不指定时 cookie 只保存在内存
    #[arg(long, env = "DOCCHAT_COOKIE_DB")]
    cookie_db: Option<String>,

    /// 沿用已知的 session token
    #[arg(long)]
    session: Option<String>,

    /// 新建会话
    #[arg(long)]
    new_session: bool,

    /// 提问前清空服务器上的文档
    #[arg(long)]
    clear: bool,

    /// 要上传的文件（可重复）
    #[arg(short, long)]
    upload: Vec<PathBuf>,

    /// 允许上传非 PDF 文件
    #[arg(long)]
    allow_any_type: bool,

    /// 使用预设问题（下标从 0 开始）
    #[arg(short, long)]
    preset: Option<usize>,

    /// 要提的问题
    #[arg(short, long)]
    ask: Option<String>,

    /// 使用流式接口
    #[arg(long)]
    stream: bool,

    /// 请求超时（秒），0 表示不设超时
    #[arg(long, default_value = "0")]
    timeout: u64,

    /// 日志级别（默认: info,docchat_sdk_core_rust=debug）
    #[arg(long, default_value = "info,docchat_sdk_core_rust=debug")]
    log_level: String,
}

/// 初始化日志（同时输出到 stdout 和文件）
fn init_logger(log_level: &str) -> Result<()> {
    use std::fs::OpenOptions;
    use std::io;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    // 优先使用环境变量 RUST_LOG（如果设置了），否则使用命令行参数
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .map_err(|e| anyhow::anyhow!("无法创建日志文件 debug.log: {}", e))?;

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(true);

    // 文件不需要颜色
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!("[CLI] 📝 日志已同时输出到控制台和文件: debug.log");
    Ok(())
}

/// 输出所有状态变化
struct CliListener;

#[async_trait::async_trait]
impl DocChatListener for CliListener {
    async fn on_session_resolved(&self, session_cookie: String) {
        info!("[CLI/Session] ✅ 当前会话: {}", session_cookie);
    }

    async fn on_documents_changed(&self, confirmed_json: String, staged_json: String) {
        info!(
            "[CLI/Document] 📄 已上传: {} | 待上传: {}",
            confirmed_json, staged_json
        );
    }

    async fn on_upload_status_changed(&self, uploading: bool) {
        if uploading {
            info!("[CLI/Document] ⏳ 上传中...");
        }
    }

    async fn on_transcript_changed(&self, transcript_json: String) {
        info!("[CLI/Chat] 💬 对话更新: {}", transcript_json);
    }

    async fn on_awaiting_response_changed(&self, awaiting: bool) {
        if awaiting {
            info!("[CLI/Chat] ⏳ 等待回答...");
        }
    }

    async fn on_stream_chunk(&self, chunk: String) {
        info!("[CLI/Chat] 📨 {}", chunk);
    }

    async fn on_notification(&self, message: String) {
        error!("[CLI/Notify] ⚠️ {}", message);
    }

    async fn on_advisory(&self, message: String) {
        warn!("[CLI/Notify] 💡 {}", message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logger(&args.log_level)?;

    info!("[CLI] 🚀 文档问答 CLI 客户端");
    info!("[CLI] 🌐 服务器: {}", args.server);

    let mut config = ClientConfig::new(args.server.clone());
    config.cookie_db_url = args.cookie_db.clone();
    config.pdf_only = !args.allow_any_type;
    if args.timeout > 0 {
        config.request_timeout = Some(Duration::from_secs(args.timeout));
    }

    let mut client = DocChatClient::build(config).await?;
    client.set_listener(Arc::new(CliListener));

    if let Some(token) = &args.session {
        client.set_session_cookie(token.clone()).await;
    }

    client
        .init()
        .await
        .map_err(|e| anyhow::anyhow!("身份解析失败: {}", e))?;

    if args.new_session {
        client.new_session().await?;
    }

    if args.clear {
        client.clear_documents().await?;
    }

    if !args.upload.is_empty() {
        let mut files = Vec::with_capacity(args.upload.len());
        for path in &args.upload {
            files.push(StagedDocument::from_path(path).await?);
        }
        let outcome = client.stage_documents(files).await?;
        for name in &outcome.rejected {
            warn!("[CLI] 🚫 已跳过非 PDF 文件: {}", name);
        }
    }

    if let Some(index) = args.preset {
        match client.apply_preset(index).await {
            Some(preset) => info!("[CLI] 📌 预设问题: {} - {}", preset.title, preset.content),
            None => {
                let titles: Vec<&str> = PRESETS.iter().map(|p| p.title).collect();
                return Err(anyhow::anyhow!(
                    "预设问题下标越界: {}（可选: {:?}）",
                    index,
                    titles
                ));
            }
        }
    }
    if let Some(question) = &args.ask {
        client.set_draft(question.clone()).await;
    }

    let snapshot = client.snapshot().await;
    if !snapshot.draft.is_empty() {
        let outcome = if args.stream {
            let draft = snapshot.draft.clone();
            client.set_draft(String::new()).await;
            client.submit_streaming(&draft).await?
        } else {
            client.submit_draft().await?
        };
        match outcome {
            SubmitOutcome::Answered(reply) => {
                info!("[CLI] 🤖 回答:");
                for line in reply.lines() {
                    info!("[CLI]   {}", line);
                }
            }
            SubmitOutcome::NeedsDocuments => {
                warn!("[CLI] 请先上传文档（--upload）");
            }
            other => info!("[CLI] 提问结果: {:?}", other),
        }
    }

    let snapshot = client.snapshot().await;
    info!(
        "[CLI] 📋 会话 {:?}：文档 {} 个，消息 {} 条",
        snapshot.session_cookie,
        snapshot.confirmed_documents.len(),
        snapshot.transcript.len()
    );
    info!("[CLI] 👋 程序退出");
    Ok(())
}
