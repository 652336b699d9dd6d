//! 文档本地模型定义

use anyhow::{Context, Result};
use std::path::Path;

/// 本地选中、尚未被服务器确认的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedDocument {
    /// 文件名（上传时作为 multipart 的 filename）
    pub file_name: String,
    /// 文件内容，对 SDK 来说是不透明的字节
    pub bytes: Vec<u8>,
}

impl StagedDocument {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// 从磁盘读取文件
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .context(format!("读取文件失败: {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("无效的文件路径: {}", path.display()))?;
        Ok(Self::new(file_name, bytes))
    }

    /// 是否为 PDF（按扩展名判断，不区分大小写）
    pub fn is_pdf(&self) -> bool {
        Path::new(&self.file_name)
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false)
    }
}

/// 一次暂存的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageOutcome {
    /// 进入待上传列表的文件名
    pub accepted: Vec<String>,
    /// 被类型过滤掉的文件名
    pub rejected: Vec<String>,
}

/// 一批正在上传的文件
#[derive(Debug)]
pub struct UploadBatch {
    /// 发起时的文档代数，用于丢弃过期的完成结果
    pub generation: u64,
    pub files: Vec<StagedDocument>,
}
