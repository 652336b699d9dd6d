//! 通知通道与临时提示
//!
//! - [`NotificationChannel`]：全局唯一的错误提示字符串，后写覆盖，不排队
//! - [`Advisory`]：“请先上传文档”之类的本地提示，固定时长后自动消失

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// 提示自动消失的时长
pub const ADVISORY_DURATION: Duration = Duration::from_millis(3000);

/// 没有文档时提问的提示文案
pub const UPLOAD_FIRST_ADVISORY: &str = "Please upload documents before asking a question.";

/// 通知通道：空字符串表示隐藏
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationChannel {
    signal: String,
}

impl NotificationChannel {
    /// 发出通知（覆盖上一条）
    pub fn raise(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.signal.is_empty() {
            debug!("[Notify] 覆盖未关闭的通知: {}", self.signal);
        }
        warn!("[Notify] 🔔 {}", message);
        self.signal = message;
    }

    /// 用户关闭通知
    pub fn dismiss(&mut self) {
        self.signal.clear();
    }

    pub fn signal(&self) -> &str {
        &self.signal
    }

    pub fn is_visible(&self) -> bool {
        !self.signal.is_empty()
    }
}

/// 定时自动消失的提示，与通知通道相互独立
#[derive(Debug, Clone, Default)]
pub struct Advisory {
    current: Option<(String, Instant)>,
}

impl Advisory {
    /// 显示提示，`ADVISORY_DURATION` 后自动消失
    pub fn show(&mut self, message: impl Into<String>) {
        self.current = Some((message.into(), Instant::now() + ADVISORY_DURATION));
    }

    /// 当前仍在显示的提示
    pub fn message(&self) -> Option<&str> {
        match &self.current {
            Some((message, until)) if Instant::now() < *until => Some(message.as_str()),
            _ => None,
        }
    }
}
