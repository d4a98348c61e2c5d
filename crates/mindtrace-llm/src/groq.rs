use async_trait::async_trait;
use serde_json::json;

use crate::provider::{ProviderCallError, ProviderClient, ProviderId, ProviderSettings};

const API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Groq OpenAI-compatible chat client. Routed the throughput-sensitive
/// tasks by default.
pub struct GroqClient {
    settings: ProviderSettings,
    http: reqwest::Client,
}

impl GroqClient {
    pub fn new(settings: ProviderSettings, http: reqwest::Client) -> Self {
        Self { settings, http }
    }
}

#[async_trait]
impl ProviderClient for GroqClient {
    fn id(&self) -> ProviderId {
        ProviderId::Groq
    }

    async fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        structured: bool,
    ) -> Result<String, ProviderCallError> {
        let mut payload = json!({
            "model": self.settings.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are an expert educational evaluator. Respond in valid JSON format.",
                },
                {
                    "role": "user",
                    "content": prompt,
                },
            ],
            "temperature": temperature,
            "max_tokens": 2048,
            "top_p": 0.95,
        });
        if structured {
            payload["response_format"] = json!({ "type": "json_object" });
        }

        let response = self
            .http
            .post(API_URL)
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderCallError::RateLimited);
        }
        if !status.is_success() {
            return Err(ProviderCallError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let data: serde_json::Value = response.json().await?;
        data["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderCallError::Malformed("response missing message content".to_string()))
    }
}
