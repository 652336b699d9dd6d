//! 客户端文档登记
//!
//! 维护两个列表：服务器确认的文档标识和本地待上传的文件。
//! 同一时间最多只有一批文件在上传；上传期间新暂存的文件排队等待下一批。

use crate::chat::document::models::{StageOutcome, StagedDocument, UploadBatch};
use tracing::{debug, info, warn};

/// 文档登记表
#[derive(Debug)]
pub struct DocumentRegistry {
    confirmed: Vec<String>,
    /// 等待上传的文件
    staged: Vec<StagedDocument>,
    /// 正在上传的文件名（文件本身随 UploadBatch 移出）
    in_flight: Vec<String>,
    /// 有一批请求尚未返回；只由该批次自己的完成或失败清除，基线替换不影响
    uploading: bool,
    generation: u64,
    pdf_only: bool,
}

impl DocumentRegistry {
    pub fn new(pdf_only: bool) -> Self {
        Self {
            confirmed: Vec::new(),
            staged: Vec::new(),
            in_flight: Vec::new(),
            uploading: false,
            generation: 0,
            pdf_only,
        }
    }

    /// 服务器确认的文档
    pub fn confirmed(&self) -> &[String] {
        &self.confirmed
    }

    /// 尚未确认的文件名：正在上传的在前，排队的在后
    pub fn staged_names(&self) -> Vec<String> {
        self.in_flight
            .iter()
            .cloned()
            .chain(self.staged.iter().map(|f| f.file_name.clone()))
            .collect()
    }

    pub fn has_staged(&self) -> bool {
        !self.staged.is_empty() || !self.in_flight.is_empty()
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    /// 暂存文件；开启 PDF 过滤时丢弃其他类型
    pub fn stage(&mut self, files: Vec<StagedDocument>) -> StageOutcome {
        let mut outcome = StageOutcome::default();
        for file in files {
            if self.pdf_only && !file.is_pdf() {
                warn!("[DocRegistry] 跳过非 PDF 文件: {}", file.file_name);
                outcome.rejected.push(file.file_name);
                continue;
            }
            debug!("[DocRegistry] 暂存文件: {}", file.file_name);
            outcome.accepted.push(file.file_name.clone());
            self.staged.push(file);
        }
        outcome
    }

    /// 取出下一批待上传文件；已有一批在途或没有待上传文件时返回 None
    pub fn begin_upload(&mut self) -> Option<UploadBatch> {
        if self.is_uploading() || self.staged.is_empty() {
            return None;
        }
        let files = std::mem::take(&mut self.staged);
        self.uploading = true;
        self.in_flight = files.iter().map(|f| f.file_name.clone()).collect();
        info!("[DocRegistry] 开始上传 {} 个文件", files.len());
        Some(UploadBatch {
            generation: self.generation,
            files,
        })
    }

    /// 上传成功：追加服务器返回的标识。返回结果是否被采用
    pub fn complete_upload(&mut self, batch: UploadBatch, documents: Vec<String>) -> bool {
        self.uploading = false;
        if batch.generation != self.generation {
            warn!(
                "[DocRegistry] 丢弃过期的上传结果（代数 {} != {}）: {:?}",
                batch.generation, self.generation, documents
            );
            return false;
        }
        info!("[DocRegistry] ✅ 上传确认: {:?}", documents);
        self.in_flight.clear();
        self.confirmed.extend(documents);
        true
    }

    /// 上传失败：文件放回待上传列表头部，保持原顺序，不自动重试
    pub fn fail_upload(&mut self, batch: UploadBatch) {
        self.uploading = false;
        if batch.generation != self.generation {
            debug!("[DocRegistry] 过期批次上传失败，直接丢弃");
            return;
        }
        warn!(
            "[DocRegistry] 上传失败，{} 个文件保留在待上传列表",
            batch.files.len()
        );
        self.in_flight.clear();
        let mut files = batch.files;
        files.append(&mut self.staged);
        self.staged = files;
    }

    /// 用服务器会话覆盖本地状态（丢弃所有未确认文件）
    pub fn replace_baseline(&mut self, documents: Vec<String>) {
        if self.has_staged() {
            warn!(
                "[DocRegistry] 会话切换，丢弃未确认文件: {:?}",
                self.staged_names()
            );
        }
        self.generation += 1;
        self.confirmed = documents;
        self.staged.clear();
        self.in_flight.clear();
    }

    /// 服务器确认删除后清空两个列表
    pub fn apply_clear(&mut self) {
        info!("[DocRegistry] 清空文档");
        self.replace_baseline(Vec::new());
    }

    /// 只替换确认列表，保留待上传文件（GET /session 刷新时使用）
    pub fn refresh_confirmed(&mut self, documents: Vec<String>) {
        self.confirmed = documents;
    }
}
