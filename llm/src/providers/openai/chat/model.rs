use crate::api::{ChatChunk, ChatMessage, ChatRequest, Role};
use crate::client::Client;
use crate::traffic_log;
use crate::ChatModel;
use crate::ChatStream;
use async_trait::async_trait;
use futures::StreamExt;

use super::api::{ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse};

#[derive(Clone)]
pub struct OpenAIChatModel {
    client: Client,
    base_url: String,
    model_name: String,
}

impl OpenAIChatModel {
    pub fn new(client: Client, base_url: String, model_name: String) -> Self {
        OpenAIChatModel {
            client,
            base_url,
            model_name,
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Select the JSON payload of an SSE `data:` line, skipping the `[DONE]` marker.
fn sse_data(line: &str) -> Option<&str> {
    let json_str = line.trim().strip_prefix("data:")?.trim_start();
    if json_str == "[DONE]" {
        return None;
    }
    Some(json_str)
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<ChatMessage> {
        let openai_request =
            ChatCompletionRequest::from_request(self.model_name.clone(), request, false);
        traffic_log::log_request(&self.model_name, false, &openai_request);

        let response: ChatCompletionResponse = self
            .client
            .post(self.chat_url(), &openai_request)
            .await
            .inspect_err(|e| traffic_log::log_error(&self.model_name, e))?;
        traffic_log::log_response(&self.model_name, &response);

        Ok(response.into())
    }

    async fn stream_chat(&self, request: &ChatRequest) -> anyhow::Result<ChatStream> {
        let openai_request =
            ChatCompletionRequest::from_request(self.model_name.clone(), request, true);
        traffic_log::log_request(&self.model_name, true, &openai_request);

        let stream = self
            .client
            .post_stream::<_, _, _, ChatCompletionChunk>(self.chat_url(), &openai_request, sse_data)
            .await
            .inspect_err(|e| traffic_log::log_error(&self.model_name, e))?;

        let model_name = self.model_name.clone();
        let chat_stream = stream
            .filter_map(|chunk| async move {
                match chunk {
                    Ok(chunk) => {
                        let choice = chunk.choices.into_iter().next()?;
                        let role = choice.delta.role.unwrap_or(Role::Assistant);
                        let content = choice.delta.content.unwrap_or_default();
                        Some(Ok(ChatChunk::new(role, content)))
                    }
                    Err(e) => Some(Err(e)),
                }
            })
            .inspect(move |item| {
                if let Err(e) = item {
                    traffic_log::log_error(&model_name, e);
                }
            });

        Ok(Box::pin(chat_stream))
    }
}
