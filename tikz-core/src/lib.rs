//! Core of the TikZ studio
//!
//! This crate provides:
//! - **Conversation**: `ConversationStore` with snapshot reads and `Transaction` commits
//! - **Extraction**: `extract` to pull TikZ source out of a model reply
//! - **Generation**: the `Generator` trait and `LlmGenerator` over any `llm::ChatModel`
//! - **Rendering**: the `Renderer` trait and `LatexRenderer` (compiler + rasterizer subprocesses)
//! - **Engine**: `DiagramEngine`, which runs pipeline jobs one at a time
//! - **Workbench**: toolkit-independent window state driven by engine events
pub mod context;
pub mod conversation;
pub mod diagram;
pub mod engine;
pub mod error;
pub mod extract;
pub mod generate;
pub mod render;
pub mod workbench;

pub use context::AppContext;
pub use conversation::{ConversationStore, Message, Role, Transaction};
pub use diagram::{DiagramStatus, DiagramVersion, JobId, Origin};
pub use engine::{DiagramEngine, EngineCommand, EngineEvent, JobKind};
pub use error::PipelineError;
pub use extract::extract;
pub use generate::{ContextWindow, GenerationError, Generator, LlmGenerator};
pub use render::{
    wrap_document, LatexRenderer, RenderError, RenderErrorKind, RenderRequest, RenderedImage,
    Renderer,
};
pub use workbench::{LogEntry, LogKind, Workbench};
