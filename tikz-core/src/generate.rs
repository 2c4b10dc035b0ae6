//! Asking a language model for TikZ.

use crate::conversation::{Message, Role};
use async_trait::async_trait;
use futures::StreamExt;
use llm::{ApiError, ChatMessage, ChatModel, ChatRequest, GenerationOptions};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub const SYSTEM_PROMPT: &str = "Generate ONLY valid TikZ code. Your response must follow this EXACT format:
\\begin{tikzpicture}
% Your TikZ commands here
\\end{tikzpicture}

Rules:
1. Keep it simple - just basic shapes and lines
2. Use standard colors (red, blue, green, etc.)
3. Center components at (0,0)
4. No scaling or transformations
5. No shadows or fancy effects

DO NOT add ANY text before or after the code.";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("could not reach the model API: {0}")]
    Network(String),

    #[error("the model API rejected the credentials; check the API key ({0})")]
    Authentication(String),

    #[error("the model API is rate limiting requests; wait a moment and resubmit ({0})")]
    RateLimited(String),

    #[error("the model API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("the model API sent a response that could not be understood: {0}")]
    Malformed(String),

    #[error("the model returned an empty response")]
    EmptyResponse,
}

impl From<ApiError> for GenerationError {
    fn from(err: ApiError) -> Self {
        if err.is_auth() {
            return GenerationError::Authentication(err.to_string());
        }
        if err.is_rate_limited() {
            return GenerationError::RateLimited(err.to_string());
        }
        match err {
            ApiError::Status { status, body } => GenerationError::Api { status, body },
            ApiError::Decode(e) => GenerationError::Malformed(e.to_string()),
            ApiError::Utf8(e) => GenerationError::Malformed(e.to_string()),
            ApiError::Transport(e) if e.is_decode() => GenerationError::Malformed(e.to_string()),
            ApiError::Transport(e) => GenerationError::Network(e.to_string()),
            ApiError::InvalidHeader(msg) => GenerationError::Authentication(msg),
        }
    }
}

impl From<anyhow::Error> for GenerationError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ApiError>() {
            Ok(api) => api.into(),
            Err(other) => GenerationError::Network(format!("{:#}", other)),
        }
    }
}

/// Produces model text for a conversation.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, history: &[Message]) -> Result<String, GenerationError>;
}

/// Bounds on how much history is sent with each request.
///
/// Whole messages are dropped from the front until both limits hold. The
/// newest message is always kept, and the system prompt is not counted since
/// it is never dropped. A window never opens on an assistant reply, so the
/// model always sees the turn that prompted it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ContextWindow {
    pub max_messages: usize,
    pub max_chars: usize,
}

impl ContextWindow {
    pub fn apply<'a>(&self, history: &'a [Message]) -> &'a [Message] {
        let mut start = history.len();
        let mut chars = 0;
        for (i, message) in history.iter().enumerate().rev() {
            let len = message.text.chars().count();
            let kept = history.len() - i;
            if start < history.len() && (kept > self.max_messages || chars + len > self.max_chars) {
                break;
            }
            chars += len;
            start = i;
        }
        while start + 1 < history.len() && history[start].role == Role::Assistant {
            start += 1;
        }
        &history[start..]
    }
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self {
            max_messages: config::app_config::DEFAULT_MAX_HISTORY_MESSAGES,
            max_chars: config::app_config::DEFAULT_MAX_HISTORY_CHARS,
        }
    }
}

/// [`Generator`] over any chat model.
pub struct LlmGenerator {
    model: Arc<dyn ChatModel + Send + Sync>,
    options: GenerationOptions,
    window: ContextWindow,
    stream: bool,
}

impl LlmGenerator {
    pub fn new(model: Arc<dyn ChatModel + Send + Sync>) -> Self {
        Self {
            model,
            options: GenerationOptions::default(),
            window: ContextWindow::default(),
            stream: true,
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_window(mut self, window: ContextWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    fn build_request(&self, history: &[Message]) -> ChatRequest {
        let window = self.window.apply(history);
        if window.len() < history.len() {
            debug!(
                "Dropped {} oldest messages from context",
                history.len() - window.len()
            );
        }

        let messages: Vec<ChatMessage> = std::iter::once(ChatMessage::system(SYSTEM_PROMPT))
            .chain(
                window
                    .iter()
                    .map(|m| ChatMessage::new(m.role.into(), m.text.clone())),
            )
            .collect();
        ChatRequest::new(&messages).with_options(self.options.clone())
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, history: &[Message]) -> Result<String, GenerationError> {
        let request = self.build_request(history);
        info!(
            model = self.model.name(),
            messages = request.messages().len(),
            "Requesting TikZ"
        );

        let text = if self.stream {
            let mut stream = self.model.stream_chat(&request).await?;
            let mut text = String::new();
            while let Some(chunk) = stream.next().await {
                text.push_str(&chunk?.content);
            }
            text
        } else {
            self.model.chat(&request).await?.content
        };

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text)
    }
}
