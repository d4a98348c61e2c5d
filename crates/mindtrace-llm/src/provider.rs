use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Gemini,
    Groq,
}

impl ProviderId {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "gemini",
            ProviderId::Groq => "groq",
        }
    }

    /// The provider to fall back to when this one fails.
    pub fn alternate(&self) -> ProviderId {
        match self {
            ProviderId::Gemini => ProviderId::Groq,
            ProviderId::Groq => ProviderId::Gemini,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderCallError {
    #[error("rate limited")]
    RateLimited,

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed provider payload: {0}")]
    Malformed(String),
}

/// One LLM provider behind the gateway. Providers differ in
/// latency/cost/accuracy, never in this calling contract.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Generate raw text for a prompt. `structured` is a hint that the
    /// caller expects a JSON object back.
    async fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        structured: bool,
    ) -> Result<String, ProviderCallError>;
}

/// Connection settings for one HTTP provider, passed in explicitly at
/// construction rather than read from the environment at call time.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: String,
    pub model: String,
}
