use async_trait::async_trait;
use serde_json::json;

use crate::provider::{ProviderCallError, ProviderClient, ProviderId, ProviderSettings};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1/models";

/// Gemini `generateContent` client. Routed the accuracy-sensitive
/// tasks by default.
pub struct GeminiClient {
    settings: ProviderSettings,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(settings: ProviderSettings, http: reqwest::Client) -> Self {
        Self { settings, http }
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    async fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        structured: bool,
    ) -> Result<String, ProviderCallError> {
        let url = format!(
            "{API_BASE}/{}:generateContent?key={}",
            self.settings.model, self.settings.api_key
        );

        // Gemini has no structured-output switch; the instruction has
        // to live in the prompt.
        let mut prompt = prompt.to_string();
        if structured && !prompt.to_lowercase().contains("json") {
            prompt.push_str(
                "\n\nYou MUST return ONLY a valid JSON object. No markdown, no code blocks, \
                 no explanations - just pure JSON.",
            );
        }

        let response = self
            .http
            .post(&url)
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
                "generationConfig": {
                    "temperature": temperature,
                    "topP": 0.95,
                    "topK": 40,
                    "maxOutputTokens": 8192,
                },
            }))
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

        let candidate = data["candidates"]
            .get(0)
            .ok_or_else(|| ProviderCallError::Malformed("no candidates returned".to_string()))?;
        if candidate["finishReason"] == "SAFETY" {
            return Err(ProviderCallError::Malformed(
                "generation blocked by safety settings".to_string(),
            ));
        }

        candidate["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderCallError::Malformed("candidate missing text part".to_string()))
    }
}
