//! Language-model completion client

use super::types::{ChatCompletion, CompletionRequest};
use crate::config::ModelConfig;
use crate::error::{ModelError, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

/// Anything that can turn a conversation into the next assistant message
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<ChatCompletion>;
}

/// OpenAI-compatible chat-completions client
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    /// Build a client; fails when no API key is configured
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ModelError::MissingApiKey)?
            .to_string();

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ModelError::Network)?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key,
            model: config.model.clone(),
        })
    }

    /// Build URL from the base URL and a path
    fn build_url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Model name configured for this endpoint
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<ChatCompletion> {
        let url = self.build_url("chat/completions");

        info!(
            model = request.model.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending chat completion request"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(ModelError::Network)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let completion: ChatCompletion = response.json().await.map_err(ModelError::Network)?;
        if completion.choices.is_empty() {
            return Err(ModelError::EmptyResponse.into());
        }

        debug!(
            "Received completion ({} choices, usage: {:?})",
            completion.choices.len(),
            completion.usage
        );
        Ok(completion)
    }
}
