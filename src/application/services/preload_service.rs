//! Preload Service - 通过后台任务预热 PDF/音频缓存
//!
//! 入队时只检查源文件是否存在，实际工作在 worker 线程中完成，
//! 产物写入同步路径读取的同一份缓存

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::audio_service::AudioService;
use super::pdf_service::PdfService;
use crate::application::error::ApplicationError;
use crate::application::ports::{TaskCallback, TaskJob, TaskOutcome, TaskQueuePort, TaskState};
use crate::domain::pdf::RenderOptions;

/// 预加载任务状态
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PreloadStatus {
    /// 排队中或执行中
    Pending,
    Completed { result: Value },
    Failed { error: String },
}

/// 预加载任务类别，按任务名前缀区分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadKind {
    Pdf,
    Audio,
}

impl PreloadKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pdf" => Some(PreloadKind::Pdf),
            "audio" => Some(PreloadKind::Audio),
            _ => None,
        }
    }

    fn of_task(name: &str) -> Option<Self> {
        if name.starts_with("preload_pdf") {
            Some(PreloadKind::Pdf)
        } else if name.starts_with("preload_audio") {
            Some(PreloadKind::Audio)
        } else {
            None
        }
    }
}

pub struct PreloadService {
    pdf: Arc<PdfService>,
    audio: Arc<AudioService>,
    queue: Arc<dyn TaskQueuePort>,
}

impl PreloadService {
    pub fn new(pdf: Arc<PdfService>, audio: Arc<AudioService>, queue: Arc<dyn TaskQueuePort>) -> Self {
        Self { pdf, audio, queue }
    }

    fn require_file(path: &Path, kind: &'static str) -> Result<(), ApplicationError> {
        if path.is_file() {
            Ok(())
        } else {
            tracing::error!(path = %path.display(), "Preload source not found");
            Err(ApplicationError::not_found(kind, path.display().to_string()))
        }
    }

    fn enqueue(
        &self,
        name: &str,
        path: &Path,
        args: String,
        job: TaskJob,
        callback: Option<TaskCallback>,
    ) -> Result<String, ApplicationError> {
        let task_id = self.queue.add_task(name, &args, job, callback)?;
        tracing::info!(task_id = %task_id, name = %name, path = %path.display(), "Preload enqueued");
        Ok(task_id)
    }

    /// 预热文档信息与全部页面文本，结果为文档信息
    pub fn preload_pdf(
        &self,
        path: &Path,
        callback: Option<TaskCallback>,
    ) -> Result<String, ApplicationError> {
        Self::require_file(path, "PDF file")?;

        let pdf = self.pdf.clone();
        let source: PathBuf = path.to_path_buf();
        let job: TaskJob = Box::new(move || {
            let info = pdf
                .get_pdf_info(&source)
                .ok_or_else(|| format!("failed to read PDF info: {}", source.display()))?;
            for page in 1..=info.total_pages as u32 {
                pdf.get_page_text(&source, page);
            }
            serde_json::to_value(&info).map_err(|e| e.to_string())
        });

        self.enqueue("preload_pdf", path, path.display().to_string(), job, callback)
    }

    /// 预渲染页面图片
    ///
    /// `page_range` 被截断到 `[1, total_pages]`，缺省为整个文档
    pub fn preload_pdf_images(
        &self,
        path: &Path,
        page_range: Option<(u32, u32)>,
        options: RenderOptions,
        callback: Option<TaskCallback>,
    ) -> Result<String, ApplicationError> {
        Self::require_file(path, "PDF file")?;

        let pdf = self.pdf.clone();
        let source: PathBuf = path.to_path_buf();
        let args = format!("{}|{:?}|{}", path.display(), page_range, options.artifact_params(0));
        let job: TaskJob = Box::new(move || {
            let info = pdf
                .get_pdf_info(&source)
                .ok_or_else(|| format!("failed to read PDF info: {}", source.display()))?;
            let total = info.total_pages as u32;
            let (start, end) = match page_range {
                Some((start, end)) => (start.max(1), end.min(total)),
                None => (1, total),
            };

            let mut preloaded = BTreeMap::new();
            for page in start..=end {
                let ok = pdf.get_page_as_image(&source, page, &options).is_some();
                preloaded.insert(page, ok);
            }

            Ok(json!({
                "total_pages": info.total_pages,
                "preloaded_pages": preloaded,
            }))
        });

        self.enqueue("preload_pdf_images", path, args, job, callback)
    }

    /// 预热音频信息，结果为 `{info, markers}`
    pub fn preload_audio(
        &self,
        path: &Path,
        callback: Option<TaskCallback>,
    ) -> Result<String, ApplicationError> {
        Self::require_file(path, "Audio file")?;

        let audio = self.audio.clone();
        let source: PathBuf = path.to_path_buf();
        let job: TaskJob = Box::new(move || {
            let info = audio
                .get_audio_info(&source)
                .ok_or_else(|| format!("failed to read audio info: {}", source.display()))?;
            let markers = audio.get_audio_markers(&source);
            Ok(json!({ "info": info, "markers": markers }))
        });

        self.enqueue("preload_audio", path, path.display().to_string(), job, callback)
    }

    /// 读取并缓存第一个分块
    pub fn preload_audio_chunk(
        &self,
        path: &Path,
        chunk_size: u64,
        callback: Option<TaskCallback>,
    ) -> Result<String, ApplicationError> {
        Self::require_file(path, "Audio file")?;
        // 分块大小在入队前校验
        self.audio.chunk_layout(path, chunk_size)?;

        let audio = self.audio.clone();
        let source: PathBuf = path.to_path_buf();
        let job: TaskJob = Box::new(move || {
            let layout = audio
                .chunk_layout(&source, chunk_size)
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("audio file disappeared: {}", source.display()))?;
            let cached = layout.num_chunks > 0
                && audio.get_audio_chunk(&source, 0, chunk_size).is_some();

            Ok(json!({
                "file_size": layout.file_size,
                "chunk_size": layout.chunk_size,
                "num_chunks": layout.num_chunks,
                "first_chunk_cached": cached,
            }))
        });

        self.enqueue(
            "preload_audio_chunk",
            path,
            format!("{}|{}", path.display(), chunk_size),
            job,
            callback,
        )
    }

    /// 任务状态，未知任务返回 None
    pub fn get_preload_status(&self, task_id: &str) -> Option<PreloadStatus> {
        self.status_of(task_id, None)
    }

    /// 指定类别的任务状态；类别不符视同未知任务
    pub fn get_preload_status_of(&self, task_id: &str, kind: PreloadKind) -> Option<PreloadStatus> {
        self.status_of(task_id, Some(kind))
    }

    fn status_of(&self, task_id: &str, kind: Option<PreloadKind>) -> Option<PreloadStatus> {
        let snapshot = self.queue.snapshot(task_id)?;
        if kind.is_some() && PreloadKind::of_task(&snapshot.name) != kind {
            return None;
        }
        let status = match (snapshot.state, snapshot.outcome) {
            (_, Some(TaskOutcome::Completed(result))) => PreloadStatus::Completed { result },
            (_, Some(TaskOutcome::Failed(error))) => PreloadStatus::Failed { error },
            (TaskState::Pending | TaskState::Running, None) => PreloadStatus::Pending,
            (state, None) => {
                tracing::warn!(task_id = %task_id, state = state.as_str(), "Finished task without outcome");
                PreloadStatus::Pending
            }
        };
        Some(status)
    }
}
