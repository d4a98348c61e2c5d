use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of LLM request, used for provider routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Evaluate,
    Evidence,
    Rewrite,
    Coherence,
    Pacing,
}

impl TaskType {
    pub fn name(&self) -> &'static str {
        match self {
            TaskType::Evaluate => "evaluate",
            TaskType::Evidence => "evidence",
            TaskType::Rewrite => "rewrite",
            TaskType::Coherence => "coherence",
            TaskType::Pacing => "pacing",
        }
    }
}

/// Expected shape of the provider response. Structured requests carry
/// the top-level keys the caller requires; a missing key is a failure,
/// never silently defaulted.
#[derive(Debug, Clone)]
pub enum ResponseFormat {
    Text,
    Structured { required_keys: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub prompt: String,
    pub task_type: TaskType,
    pub response_format: ResponseFormat,
    pub temperature: f32,
    pub max_retries: u32,
}

impl LlmRequest {
    pub fn structured(
        prompt: impl Into<String>,
        task_type: TaskType,
        required_keys: Vec<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            task_type,
            response_format: ResponseFormat::Structured { required_keys },
            temperature: 0.7,
            max_retries: 3,
        }
    }

    pub fn text(prompt: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            prompt: prompt.into(),
            task_type,
            response_format: ResponseFormat::Text,
            temperature: 0.7,
            max_retries: 3,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[derive(Debug, Clone)]
pub enum Payload {
    Text(String),
    Structured(Value),
}

/// Provider label attached to every synthetic result so consumers can
/// tell degraded-mode output from a real provider call.
pub const MOCK_PROVIDER: &str = "mock";

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub payload: Payload,
    pub provider: String,
}

impl LlmResponse {
    pub fn structured(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Structured(value) => Some(value),
            Payload::Text(_) => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(text) => Some(text),
            Payload::Structured(_) => None,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.provider == MOCK_PROVIDER
    }
}
