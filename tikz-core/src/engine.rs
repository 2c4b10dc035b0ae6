//! The generate, extract and render pipeline.
//!
//! Commands go into a single queue drained by one processor task, so jobs run
//! strictly one after another in submission order and no two renders can race
//! for the preview. Progress comes back as [`EngineEvent`]s tagged with the
//! job that produced them.

use crate::context::AppContext;
use crate::conversation::{ConversationStore, Role};
use crate::diagram::{DiagramVersion, JobId, Origin};
use crate::error::PipelineError;
use crate::extract::extract;
use crate::generate::GenerationError;
use crate::render::RenderRequest;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JobKind {
    /// Ask the model, extract, render
    Generate,
    /// Render source the user applied from the editor
    Apply,
}

pub enum EngineCommand {
    Submit { job: JobId, text: String },
    ApplyCode { job: JobId, source: String },
    ClearHistory,
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Accepted into the queue; `prompt` is set for model jobs
    Queued {
        job: JobId,
        kind: JobKind,
        prompt: Option<String>,
    },
    JobStarted { job: JobId, kind: JobKind },
    /// The model's full reply, now part of the conversation
    Reply { job: JobId, text: String },
    /// New current source, not rendered yet
    DiagramUpdated { job: JobId, version: DiagramVersion },
    Rendered { job: JobId, version: DiagramVersion },
    Failed { job: JobId, error: PipelineError },
    JobFinished { job: JobId },
    HistoryCleared,
}

impl EngineEvent {
    pub fn job(&self) -> Option<JobId> {
        match self {
            EngineEvent::Queued { job, .. }
            | EngineEvent::JobStarted { job, .. }
            | EngineEvent::Reply { job, .. }
            | EngineEvent::DiagramUpdated { job, .. }
            | EngineEvent::Rendered { job, .. }
            | EngineEvent::Failed { job, .. }
            | EngineEvent::JobFinished { job } => Some(*job),
            EngineEvent::HistoryCleared => None,
        }
    }
}

/// Owns the conversation and runs pipeline jobs in the background.
///
/// Must be created inside a tokio runtime.
pub struct DiagramEngine {
    conversation: Arc<Mutex<ConversationStore>>,
    cmd_tx: mpsc::UnboundedSender<EngineCommand>,
    event_tx: mpsc::UnboundedSender<EngineEvent>,
    event_rx: mpsc::UnboundedReceiver<EngineEvent>,
    next_job: AtomicU64,
    processor_handle: JoinHandle<()>,
}

impl DiagramEngine {
    pub fn new(context: AppContext) -> Self {
        let conversation = Arc::new(Mutex::new(ConversationStore::new()));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let processor = Processor {
            context,
            conversation: Arc::clone(&conversation),
            events: event_tx.clone(),
        };
        let processor_handle = tokio::spawn(processor.run(cmd_rx));

        Self {
            conversation,
            cmd_tx,
            event_tx,
            event_rx,
            next_job: AtomicU64::new(1),
            processor_handle,
        }
    }

    fn allocate(&self) -> JobId {
        self.next_job.fetch_add(1, Ordering::Relaxed)
    }

    fn enqueue(&self, job: JobId, kind: JobKind, prompt: Option<String>, command: EngineCommand) {
        // Queued goes out before the command so it always precedes the job's
        // own events on the shared channel
        let _ = self.event_tx.send(EngineEvent::Queued { job, kind, prompt });
        if self.cmd_tx.send(command).is_err() {
            warn!("Pipeline processor has stopped; job {} dropped", job);
        }
    }

    /// Queue a prompt for generation. Returns the job id.
    pub fn submit(&self, text: impl Into<String>) -> JobId {
        let job = self.allocate();
        let text = text.into();
        self.enqueue(
            job,
            JobKind::Generate,
            Some(text.clone()),
            EngineCommand::Submit { job, text },
        );
        job
    }

    /// Queue hand-edited source for rendering, bypassing the model.
    pub fn apply_code(&self, source: impl Into<String>) -> JobId {
        let job = self.allocate();
        self.enqueue(
            job,
            JobKind::Apply,
            None,
            EngineCommand::ApplyCode {
                job,
                source: source.into(),
            },
        );
        job
    }

    pub fn clear_history(&self) {
        let _ = self.cmd_tx.send(EngineCommand::ClearHistory);
    }

    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        self.event_rx.recv().await
    }

    pub fn get_conversation(&self) -> Arc<Mutex<ConversationStore>> {
        Arc::clone(&self.conversation)
    }

    /// Stop processing. An in-flight job is cancelled, which kills any
    /// running tool and removes its scratch files.
    pub async fn shutdown(self) {
        self.processor_handle.abort();
        match self.processor_handle.await {
            Err(e) if e.is_panic() => warn!("Pipeline processor panicked: {}", e),
            _ => debug!("Pipeline processor stopped"),
        }
    }
}

struct Processor {
    context: AppContext,
    conversation: Arc<Mutex<ConversationStore>>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl Processor {
    async fn run(self, mut cmd_rx: mpsc::UnboundedReceiver<EngineCommand>) {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                EngineCommand::Submit { job, text } => {
                    self.emit(EngineEvent::JobStarted {
                        job,
                        kind: JobKind::Generate,
                    });
                    self.generate(job, text).await;
                    self.emit(EngineEvent::JobFinished { job });
                }
                EngineCommand::ApplyCode { job, source } => {
                    self.emit(EngineEvent::JobStarted {
                        job,
                        kind: JobKind::Apply,
                    });
                    self.render(job, Origin::Edited, source).await;
                    self.emit(EngineEvent::JobFinished { job });
                }
                EngineCommand::ClearHistory => {
                    self.conversation.lock().await.clear();
                    info!("Conversation cleared");
                    self.emit(EngineEvent::HistoryCleared);
                }
            }
        }
    }

    fn emit(&self, event: EngineEvent) {
        // Receiver gone means the engine was dropped; nothing left to tell
        let _ = self.events.send(event);
    }

    fn fail(&self, job: JobId, error: impl Into<PipelineError>) {
        let error = error.into();
        warn!(job, "{}", error);
        self.emit(EngineEvent::Failed { job, error });
    }

    async fn generate(&self, job: JobId, text: String) {
        // 1. Begin transaction with the prompt, then release the lock
        let mut tx = {
            let conversation = self.conversation.lock().await;
            let mut tx = conversation.begin();
            tx.add(Role::User, text);
            tx
        };

        // 2. Call the model without holding the conversation
        let reply = match self.context.generator.generate(&tx.history()).await {
            Ok(reply) => reply,
            Err(e) => {
                tx.rollback();
                return self.fail(job, e);
            }
        };

        let code = extract(&reply).to_string();
        if code.trim().is_empty() {
            tx.rollback();
            return self.fail(job, GenerationError::EmptyResponse);
        }

        // 3. Commit prompt and reply together
        tx.add(Role::Assistant, reply.clone());
        self.conversation.lock().await.commit(tx);
        self.emit(EngineEvent::Reply { job, text: reply });

        self.render(job, Origin::Generated, code).await;
    }

    async fn render(&self, job: JobId, origin: Origin, source: String) {
        let mut version = DiagramVersion::pending(job, origin, source.clone());
        self.emit(EngineEvent::DiagramUpdated {
            job,
            version: version.clone(),
        });

        match self.context.renderer.render(RenderRequest::new(source)).await {
            Ok(image) => {
                version.mark_rendered(image);
                self.emit(EngineEvent::Rendered { job, version });
            }
            Err(e) => {
                version.mark_failed();
                self.fail(job, e);
            }
        }
    }
}
