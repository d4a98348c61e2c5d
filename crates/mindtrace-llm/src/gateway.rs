use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::mock::mock_response;
use crate::normalize::{self, NormalizeError};
use crate::provider::{ProviderCallError, ProviderClient, ProviderId};
use crate::request::{LlmRequest, LlmResponse, Payload, ResponseFormat, TaskType};

/// Gateway policy, passed in at construction. Nothing here is read
/// from the environment at call time.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Preferred provider per task type.
    pub routing: HashMap<TaskType, ProviderId>,
    /// Task types that never fall back to the alternate provider.
    pub pinned: HashSet<TaskType>,
    /// Return a synthetic mock result instead of failing once every
    /// provider and retry is exhausted.
    pub permit_degraded: bool,
    pub backoff_base: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        // Accuracy-sensitive tasks go to Gemini, throughput-sensitive
        // and creative tasks to Groq.
        let routing = HashMap::from([
            (TaskType::Evaluate, ProviderId::Gemini),
            (TaskType::Evidence, ProviderId::Gemini),
            (TaskType::Pacing, ProviderId::Gemini),
            (TaskType::Rewrite, ProviderId::Groq),
            (TaskType::Coherence, ProviderId::Groq),
        ]);
        Self {
            routing,
            pinned: HashSet::new(),
            permit_degraded: false,
            backoff_base: Duration::from_secs(1),
        }
    }
}

enum AttemptError {
    RateLimited,
    Provider(String),
    Parse(String),
    Schema(String),
}

impl AttemptError {
    fn describe(&self) -> String {
        match self {
            AttemptError::RateLimited => "rate limited".to_string(),
            AttemptError::Provider(msg) => msg.clone(),
            AttemptError::Parse(msg) => format!("parse failure: {msg}"),
            AttemptError::Schema(msg) => format!("schema failure: {msg}"),
        }
    }
}

/// Single call surface over the configured providers. Owns routing,
/// retries, fallback and response normalization; callers only ever see
/// a final result or a terminal [`GatewayError`].
pub struct Gateway {
    config: GatewayConfig,
    providers: HashMap<ProviderId, Arc<dyn ProviderClient>>,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            providers: HashMap::new(),
        }
    }

    pub fn with_provider(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.providers.insert(client.id(), client);
        self
    }

    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }

    pub async fn invoke(&self, request: &LlmRequest) -> Result<LlmResponse, GatewayError> {
        let preferred = self
            .config
            .routing
            .get(&request.task_type)
            .copied()
            .unwrap_or(ProviderId::Gemini);
        let pinned = self.config.pinned.contains(&request.task_type);

        let mut candidates = vec![preferred];
        if !pinned {
            candidates.push(preferred.alternate());
        }
        candidates.retain(|id| self.providers.contains_key(id));

        if candidates.is_empty() {
            if self.config.permit_degraded {
                warn!(task = request.task_type.name(), "no provider configured, emitting mock result");
                return Ok(mock_response(request));
            }
            return Err(GatewayError::NoProviderAvailable);
        }

        let mut attempts = 0u32;
        let mut last_error = String::new();

        'providers: for (position, id) in candidates.iter().enumerate() {
            let client = &self.providers[id];

            for attempt in 0..request.max_retries.max(1) {
                attempts += 1;
                match self.attempt(client.as_ref(), request).await {
                    Ok(response) => {
                        debug!(
                            task = request.task_type.name(),
                            provider = id.name(),
                            attempts,
                            "gateway call succeeded"
                        );
                        return Ok(response);
                    }
                    Err(error) => {
                        last_error = error.describe();
                        warn!(
                            task = request.task_type.name(),
                            provider = id.name(),
                            attempt,
                            error = %last_error,
                            "gateway attempt failed"
                        );

                        let rate_limited = matches!(error, AttemptError::RateLimited);
                        self.backoff(attempt).await;

                        // Rate limits switch providers immediately; any
                        // other transient failure retries the same
                        // provider first.
                        if rate_limited && position + 1 < candidates.len() {
                            continue 'providers;
                        }
                    }
                }
            }
        }

        if self.config.permit_degraded {
            warn!(
                task = request.task_type.name(),
                attempts,
                last_error = %last_error,
                "all providers exhausted, emitting mock result"
            );
            return Ok(mock_response(request));
        }

        Err(GatewayError::Exhausted {
            attempts,
            last: last_error,
        })
    }

    async fn attempt(
        &self,
        client: &dyn ProviderClient,
        request: &LlmRequest,
    ) -> Result<LlmResponse, AttemptError> {
        let structured = matches!(request.response_format, ResponseFormat::Structured { .. });
        let raw = client
            .generate(&request.prompt, request.temperature, structured)
            .await
            .map_err(|error| match error {
                ProviderCallError::RateLimited => AttemptError::RateLimited,
                other => AttemptError::Provider(other.to_string()),
            })?;

        let payload = match &request.response_format {
            ResponseFormat::Text => Payload::Text(raw),
            ResponseFormat::Structured { required_keys } => {
                let value = normalize::parse_structured(&raw, required_keys).map_err(
                    |error| match error {
                        NormalizeError::MissingKey(key) => AttemptError::Schema(key),
                        other => AttemptError::Parse(other.to_string()),
                    },
                )?;
                Payload::Structured(value)
            }
        };

        Ok(LlmResponse {
            payload,
            provider: client.id().name().to_string(),
        })
    }

    async fn backoff(&self, attempt: u32) {
        let delay = self.config.backoff_base * 2u32.saturating_pow(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;

    /// Plays back a fixed script of outcomes; the last entry repeats
    /// once the script runs out.
    struct ScriptedProvider {
        id: ProviderId,
        script: Mutex<Vec<Result<String, ProviderCallError>>>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(id: ProviderId, script: Vec<Result<String, ProviderCallError>>) -> Arc<Self> {
            Arc::new(Self {
                id,
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderClient for ScriptedProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        async fn generate(
            &self,
            _prompt: &str,
            _temperature: f32,
            _structured: bool,
        ) -> Result<String, ProviderCallError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            let outcome = if script.len() > 1 {
                script.remove(0)
            } else {
                match &script[0] {
                    Ok(text) => Ok(text.clone()),
                    Err(ProviderCallError::RateLimited) => Err(ProviderCallError::RateLimited),
                    Err(other) => Err(ProviderCallError::Api {
                        status: 500,
                        message: other.to_string(),
                    }),
                }
            };
            outcome
        }
    }

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            backoff_base: Duration::ZERO,
            ..GatewayConfig::default()
        }
    }

    fn eval_request() -> LlmRequest {
        LlmRequest::structured("rate this", TaskType::Evaluate, vec!["clarity".to_string()])
    }

    const VALID: &str = r#"{"clarity": {"score": 8.0, "reason": "clear"}}"#;

    #[tokio::test]
    async fn falls_back_to_secondary_on_persistent_malformed_output() {
        let gemini = ScriptedProvider::new(ProviderId::Gemini, vec![Ok("not json".to_string())]);
        let groq = ScriptedProvider::new(ProviderId::Groq, vec![Ok(VALID.to_string())]);
        let gateway = Gateway::new(test_config())
            .with_provider(gemini.clone())
            .with_provider(groq.clone());

        let response = gateway.invoke(&eval_request()).await.unwrap();
        assert_eq!(response.provider, "groq");
        assert_eq!(gemini.calls(), 3);
        assert_eq!(groq.calls(), 1);
    }

    #[tokio::test]
    async fn pinned_task_never_switches_provider() {
        let gemini = ScriptedProvider::new(ProviderId::Gemini, vec![Ok("garbage".to_string())]);
        let groq = ScriptedProvider::new(ProviderId::Groq, vec![Ok(VALID.to_string())]);
        let mut config = test_config();
        config.pinned.insert(TaskType::Evaluate);
        let gateway = Gateway::new(config)
            .with_provider(gemini.clone())
            .with_provider(groq.clone());

        let error = gateway.invoke(&eval_request()).await.unwrap_err();
        assert!(matches!(error, GatewayError::Exhausted { attempts: 3, .. }));
        assert_eq!(groq.calls(), 0);
    }

    #[tokio::test]
    async fn rate_limit_switches_provider_immediately() {
        let gemini =
            ScriptedProvider::new(ProviderId::Gemini, vec![Err(ProviderCallError::RateLimited)]);
        let groq = ScriptedProvider::new(ProviderId::Groq, vec![Ok(VALID.to_string())]);
        let gateway = Gateway::new(test_config())
            .with_provider(gemini.clone())
            .with_provider(groq.clone());

        let response = gateway.invoke(&eval_request()).await.unwrap();
        assert_eq!(response.provider, "groq");
        assert_eq!(gemini.calls(), 1);
    }

    #[tokio::test]
    async fn missing_required_key_counts_as_failure() {
        let gemini = ScriptedProvider::new(
            ProviderId::Gemini,
            vec![
                Ok(r#"{"structure": {"score": 5.0}}"#.to_string()),
                Ok(VALID.to_string()),
            ],
        );
        let gateway = Gateway::new(test_config()).with_provider(gemini.clone());

        let response = gateway.invoke(&eval_request()).await.unwrap();
        assert_eq!(response.provider, "gemini");
        assert_eq!(gemini.calls(), 2);
    }

    #[tokio::test]
    async fn no_providers_without_degraded_mode_is_fatal() {
        let gateway = Gateway::new(test_config());
        let error = gateway.invoke(&eval_request()).await.unwrap_err();
        assert!(matches!(error, GatewayError::NoProviderAvailable));
    }

    #[tokio::test]
    async fn degraded_mode_returns_flagged_mock() {
        let mut config = test_config();
        config.permit_degraded = true;
        let gateway = Gateway::new(config);

        let response = gateway.invoke(&eval_request()).await.unwrap();
        assert!(response.is_synthetic());
        assert!(response.structured().unwrap().get("clarity").is_some());
    }

    #[tokio::test]
    async fn degraded_mode_kicks_in_after_exhaustion() {
        let gemini = ScriptedProvider::new(ProviderId::Gemini, vec![Ok("nope".to_string())]);
        let groq = ScriptedProvider::new(ProviderId::Groq, vec![Ok("also nope".to_string())]);
        let mut config = test_config();
        config.permit_degraded = true;
        let gateway = Gateway::new(config)
            .with_provider(gemini)
            .with_provider(groq);

        let response = gateway.invoke(&eval_request()).await.unwrap();
        assert_eq!(response.provider, "mock");
    }

    #[tokio::test]
    async fn fenced_output_is_repaired_before_parse() {
        let gemini = ScriptedProvider::new(
            ProviderId::Gemini,
            vec![Ok(format!("```json\n{VALID}\n```"))],
        );
        let gateway = Gateway::new(test_config()).with_provider(gemini);

        let response = gateway.invoke(&eval_request()).await.unwrap();
        assert_eq!(response.structured().unwrap()["clarity"]["score"], 8.0);
    }
}
