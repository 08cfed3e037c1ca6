use async_trait::async_trait;
use serde_json::Value;

/// Text-completion collaborator. `config` may carry `system`, `model`,
/// `temperature` and `max_tokens`; providers ignore keys they do not know.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        config: &Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

#[cfg(feature = "llm")]
pub use openai::OpenAIClient;

#[cfg(feature = "llm")]
mod openai {
    use super::*;
    use crate::core::config::LlmConfig;
    use log::{debug, warn};

    pub struct OpenAIClient {
        client: reqwest::Client,
        api_key: String,
        base_url: String,
        model: String,
        temperature: f32,
        max_tokens: u32,
    }

    impl std::fmt::Debug for OpenAIClient {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("OpenAIClient")
                .field("base_url", &self.base_url)
                .field("model", &self.model)
                .finish_non_exhaustive()
        }
    }

    impl OpenAIClient {
        pub fn new(api_key: String, base_url: Option<String>) -> Self {
            Self {
                client: reqwest::Client::new(),
                api_key,
                base_url: base_url
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                    .trim_end_matches('/')
                    .to_string(),
                model: "gpt-4o-mini".to_string(),
                temperature: 0.7,
                max_tokens: 1000,
            }
        }

        /// `None` when no API key is configured.
        pub fn from_config(config: &LlmConfig) -> Option<Self> {
            let api_key = config.api_key.clone()?;
            let mut client = Self::new(api_key, Some(config.base_url.clone()));
            client.model = config.model.clone();
            client.temperature = config.temperature;
            client.max_tokens = config.max_tokens;
            Some(client)
        }
    }

    #[async_trait]
    impl LLMProvider for OpenAIClient {
        async fn generate(
            &self,
            prompt: &str,
            config: &Value,
        ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
            let mut messages = Vec::new();
            if let Some(system) = config["system"].as_str() {
                messages.push(serde_json::json!({"role": "system", "content": system}));
            }
            messages.push(serde_json::json!({"role": "user", "content": prompt}));

            let body = serde_json::json!({
                "model": config["model"].as_str().unwrap_or(&self.model),
                "messages": messages,
                "temperature": config["temperature"].as_f64().unwrap_or(self.temperature as f64),
                "max_tokens": config["max_tokens"].as_u64().unwrap_or(self.max_tokens as u64),
            });

            debug!("Requesting completion from {}", self.base_url);
            let response = self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let result: Value = response.json().await?;
            if !status.is_success() {
                warn!("Completion request failed with {status}: {result}");
                return Err(format!("LLM request failed with status {status}").into());
            }

            result["choices"][0]["message"]["content"]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| "LLM response carried no content".into())
        }
    }
}
