//! View state of the application window, independent of any GUI toolkit.
//!
//! The UI thread owns a [`Workbench`], feeds it every [`EngineEvent`] and draws
//! from it. Nothing here blocks or touches the network.

use crate::diagram::{DiagramStatus, DiagramVersion, JobId};
use crate::engine::{EngineEvent, JobKind};
use crate::render::RenderedImage;
use std::collections::BTreeSet;

pub const WELCOME: &str = "Welcome! Describe the diagram you want to create.";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogKind {
    User,
    Assistant,
    Error,
    Info,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub kind: LogKind,
    pub text: String,
}

impl LogEntry {
    fn new(kind: LogKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

pub struct Workbench {
    log: Vec<LogEntry>,
    code: String,
    current: Option<DiagramVersion>,
    preview: Option<RenderedImage>,
    /// Bumped whenever the preview image is replaced
    preview_revision: u64,
    queued: BTreeSet<JobId>,
    running: Option<(JobId, JobKind)>,
    status: String,
}

impl Default for Workbench {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbench {
    pub fn new() -> Self {
        Self {
            log: vec![LogEntry::new(LogKind::Info, WELCOME)],
            code: String::new(),
            current: None,
            preview: None,
            preview_revision: 0,
            queued: BTreeSet::new(),
            running: None,
            status: "Ready".to_string(),
        }
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Editor buffer; edits stay local until applied.
    pub fn code_mut(&mut self) -> &mut String {
        &mut self.code
    }

    /// Source to send when the user presses "Apply", if there is any.
    pub fn code_to_apply(&self) -> Option<String> {
        let code = self.code.trim();
        (!code.is_empty()).then(|| self.code.clone())
    }

    pub fn current(&self) -> Option<&DiagramVersion> {
        self.current.as_ref()
    }

    /// Last successfully rendered image. Failures never clear it.
    pub fn preview(&self) -> Option<&RenderedImage> {
        self.preview.as_ref()
    }

    pub fn preview_revision(&self) -> u64 {
        self.preview_revision
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_busy(&self) -> bool {
        !self.queued.is_empty()
    }

    pub fn running(&self) -> Option<(JobId, JobKind)> {
        self.running
    }

    /// Jobs accepted but not finished, including the running one
    pub fn pending_jobs(&self) -> usize {
        self.queued.len()
    }

    /// Report a failure that happened outside the pipeline, e.g. a lost backend.
    pub fn notice(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.status = text.clone();
        self.log.push(LogEntry::new(LogKind::Error, text));
    }

    pub fn handle(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Queued { job, prompt, .. } => {
                self.queued.insert(job);
                if let Some(prompt) = prompt {
                    self.log.push(LogEntry::new(LogKind::User, prompt));
                }
            }
            EngineEvent::JobStarted { job, kind } => {
                self.running = Some((job, kind));
                self.status = match kind {
                    JobKind::Generate => "Generating...".to_string(),
                    JobKind::Apply => "Rendering...".to_string(),
                };
            }
            EngineEvent::Reply { text, .. } => {
                self.log.push(LogEntry::new(LogKind::Assistant, text));
            }
            EngineEvent::DiagramUpdated { version, .. } => {
                self.code = version.tikz_source.clone();
                self.current = Some(version);
                self.status = "Rendering...".to_string();
            }
            EngineEvent::Rendered { version, .. } => {
                if let Some(image) = &version.rendered_image {
                    self.status = format!("Rendered {}x{}", image.width, image.height);
                    self.preview = Some(image.clone());
                    self.preview_revision += 1;
                }
                self.current = Some(version);
            }
            EngineEvent::Failed { job, error } => {
                if let Some(current) = self.current.as_mut().filter(|v| v.job == job) {
                    if current.status == DiagramStatus::Pending {
                        current.mark_failed();
                    }
                }
                self.status = error.summary().to_string();
                self.log.push(LogEntry::new(LogKind::Error, error.to_string()));
            }
            EngineEvent::JobFinished { job } => {
                self.queued.remove(&job);
                if self.running.map(|(j, _)| j) == Some(job) {
                    self.running = None;
                }
            }
            EngineEvent::HistoryCleared => {
                self.log = vec![LogEntry::new(LogKind::Info, WELCOME)];
                self.status = "Conversation cleared".to_string();
            }
        }
    }
}
