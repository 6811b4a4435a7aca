use super::{GenerateContentRequest, GenerateContentResponse, LLMError, ModelClient};
use crate::config::GeminiConfig;
use async_trait::async_trait;
use tracing::debug;

pub struct GeminiClient {
    config: GeminiConfig,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig, api_key: impl Into<String>) -> Self {
        Self {
            config,
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Build a client reading the API key from the environment variable
    /// named by `config.api_key_env`
    pub fn from_env(config: GeminiConfig) -> super::Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            LLMError::AuthenticationFailed(format!("{} is not set", config.api_key_env))
        })?;
        Ok(Self::new(config, api_key))
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn check_health(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> super::Result<GenerateContentResponse> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        debug!(
            "Calling {} with {} content turns",
            self.config.model,
            request.contents.len()
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                400 | 404 => LLMError::InvalidRequest(text),
                401 | 403 => LLMError::AuthenticationFailed(text),
                429 => LLMError::RateLimitExceeded,
                _ => LLMError::ProviderUnavailable(format!(
                    "Gemini API error ({}): {}",
                    status, text
                )),
            });
        }

        let data: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        if data.candidates.is_empty() {
            return Err(LLMError::ParseError(
                "No candidates in response".to_string(),
            ));
        }

        Ok(data)
    }
}
