use crate::client::Client;
use crate::error::ApiError;
use crate::{ChatModel, ModelProvider};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::sync::Arc;
use std::time::Duration;

use super::chat::OpenAIChatModel;

/// Provider for any endpoint speaking the OpenAI chat-completions dialect
/// (OpenAI itself, NVIDIA NIM, local gateways).
#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client,
    base_url: String,
}

const API_VERSION: &str = "v1";

impl OpenAIProvider {
    /// Create a provider for `base_url`. The API version path (/v1) is
    /// appended unless the URL already ends with it.
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| ApiError::InvalidHeader("API key contains invalid characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let base_url = base_url.trim_end_matches('/');
        let base_url = if base_url.ends_with(&format!("/{}", API_VERSION)) {
            base_url.to_string()
        } else {
            format!("{}/{}", base_url, API_VERSION)
        };

        Ok(OpenAIProvider {
            client: Client::with_headers(headers, timeout)?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ModelProvider for OpenAIProvider {
    fn create_chat_model(&self, model_name: &str) -> Arc<dyn ChatModel + Send + Sync> {
        Arc::new(OpenAIChatModel::new(
            self.client.clone(),
            self.base_url.clone(),
            model_name.to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_version_suffix() {
        let provider = OpenAIProvider::new("https://integrate.api.nvidia.com/", "key", None).unwrap();
        assert_eq!(provider.base_url(), "https://integrate.api.nvidia.com/v1");
    }

    #[test]
    fn test_base_url_keeps_existing_version() {
        let provider = OpenAIProvider::new("http://localhost:8000/v1", "key", None).unwrap();
        assert_eq!(provider.base_url(), "http://localhost:8000/v1");
    }

    #[test]
    fn test_rejects_key_with_newline() {
        let result = OpenAIProvider::new("http://localhost", "bad\nkey", None);
        assert!(matches!(result, Err(ApiError::InvalidHeader(_))));
    }

    #[test]
    fn test_created_model_reports_name() {
        let provider = OpenAIProvider::new("http://localhost", "key", None).unwrap();
        let model = provider.create_chat_model("meta/llama-3.3-70b-instruct");
        assert_eq!(model.name(), "meta/llama-3.3-70b-instruct");
    }
}
