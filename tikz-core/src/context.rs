//! Everything a session needs, assembled once at startup.

use crate::generate::{ContextWindow, Generator, LlmGenerator};
use crate::render::{LatexRenderer, Renderer};
use anyhow::Context as _;
use config::AppConfig;
use llm::{GenerationOptions, ModelProvider, OpenAIProvider};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub generator: Arc<dyn Generator>,
    pub renderer: Arc<dyn Renderer>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        generator: Arc<dyn Generator>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            generator,
            renderer,
        }
    }

    /// Wire the live model provider and the LaTeX toolchain from `config`.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let llm_config = &config.llm;
        let provider = OpenAIProvider::new(
            &llm_config.base_url,
            &llm_config.api_key,
            llm_config.request_timeout,
        )
        .context("Failed to set up the model API client")?;

        let generator = LlmGenerator::new(provider.create_chat_model(&llm_config.model))
            .with_options(GenerationOptions {
                temperature: Some(llm_config.temperature),
                top_p: Some(llm_config.top_p),
                max_tokens: Some(llm_config.max_tokens),
            })
            .with_window(ContextWindow {
                max_messages: llm_config.max_history_messages,
                max_chars: llm_config.max_history_chars,
            })
            .with_streaming(llm_config.stream);

        let renderer = LatexRenderer::new(config.render.clone());

        tracing::info!(
            model = %llm_config.model,
            endpoint = %provider.base_url(),
            compiler = %config.render.compiler.program,
            "Application context ready"
        );

        Ok(Self::new(config, Arc::new(generator), Arc::new(renderer)))
    }

    pub fn model_name(&self) -> &str {
        &self.config.llm.model
    }
}
