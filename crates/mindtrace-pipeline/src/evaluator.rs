use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use mindtrace_core::{LogicalSegment, Metric, MetricScore, ScoringEngine, SegmentEvaluation};
use mindtrace_llm::{Gateway, LlmRequest, TaskType};

/// Provider label for evaluator-substituted placeholder results, as
/// opposed to the gateway's degraded-mode `mock`.
pub const SYNTHETIC_PROVIDER: &str = "synthetic";

const SCORE_MIN: f64 = 1.0;
const SCORE_MAX: f64 = 10.0;

/// One evaluated segment plus the provider that produced it.
#[derive(Debug, Clone)]
pub struct SegmentVerdict {
    pub evaluation: SegmentEvaluation,
    pub provider: String,
}

/// Scores one logical segment across the declared metric set via the
/// gateway. Malformed results are discarded wholesale and replaced
/// with a deterministic synthetic fallback; partial data is never
/// allowed to leak into aggregates.
#[derive(Clone)]
pub struct SegmentEvaluator {
    gateway: Arc<Gateway>,
    scoring: ScoringEngine,
}

impl SegmentEvaluator {
    pub fn new(gateway: Arc<Gateway>, scoring: ScoringEngine) -> Self {
        Self { gateway, scoring }
    }

    pub async fn evaluate(
        &self,
        segment: &LogicalSegment,
        topic: &str,
        title: &str,
    ) -> SegmentVerdict {
        let metrics: Vec<Metric> = self.scoring.config().enabled_metrics().collect();
        let required_keys: Vec<String> =
            metrics.iter().map(|m| m.name().to_string()).collect();

        let request = LlmRequest::structured(
            build_evaluation_prompt(&segment.text, topic, title, &metrics),
            TaskType::Evaluate,
            required_keys,
        )
        .with_temperature(0.3);

        let (scores, provider) = match self.gateway.invoke(&request).await {
            Ok(response) => {
                let value = response.structured().cloned().unwrap_or(Value::Null);
                match parse_metric_scores(&value, &metrics) {
                    Some(scores) => (scores, response.provider),
                    None => {
                        warn!(
                            segment = segment.id,
                            provider = %response.provider,
                            "provider result failed metric validation, substituting synthetic fallback"
                        );
                        (synthetic_scores(&metrics), SYNTHETIC_PROVIDER.to_string())
                    }
                }
            }
            Err(error) => {
                warn!(segment = segment.id, error = %error, "gateway call failed, substituting synthetic fallback");
                (synthetic_scores(&metrics), SYNTHETIC_PROVIDER.to_string())
            }
        };

        let overall_segment_score = self.scoring.segment_score(&scores);
        SegmentVerdict {
            evaluation: SegmentEvaluation {
                segment_id: segment.id,
                text: segment.text.clone(),
                metrics: scores,
                overall_segment_score,
            },
            provider,
        }
    }
}

/// Every declared metric must be present with a numeric score in
/// `[1, 10]` and a non-empty reason; any violation rejects the whole
/// result.
fn parse_metric_scores(
    value: &Value,
    metrics: &[Metric],
) -> Option<BTreeMap<Metric, MetricScore>> {
    let mut scores = BTreeMap::new();
    for metric in metrics {
        let detail = value.get(metric.name())?;
        let score = detail.get("score")?.as_f64()?;
        if !(SCORE_MIN..=SCORE_MAX).contains(&score) {
            return None;
        }
        let reason = detail.get("reason")?.as_str()?.trim();
        if reason.is_empty() {
            return None;
        }
        let evidence = detail
            .get("evidence")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        scores.insert(
            *metric,
            MetricScore {
                score,
                reason: reason.to_string(),
                evidence,
            },
        );
    }
    Some(scores)
}

/// Fixed placeholder scores, clearly labeled as such. An obviously
/// synthetic result is safer than malformed partial data.
fn synthetic_scores(metrics: &[Metric]) -> BTreeMap<Metric, MetricScore> {
    metrics
        .iter()
        .map(|metric| {
            (
                *metric,
                MetricScore {
                    score: 5.0,
                    reason: format!(
                        "Synthetic fallback for {}: the provider result was discarded.",
                        metric.name()
                    ),
                    evidence: Vec::new(),
                },
            )
        })
        .collect()
}

fn build_evaluation_prompt(
    segment_text: &str,
    topic: &str,
    title: &str,
    metrics: &[Metric],
) -> String {
    let criteria = metrics
        .iter()
        .enumerate()
        .map(|(i, m)| format!("{}. **{}**", i + 1, m.label()))
        .collect::<Vec<_>>()
        .join("\n");
    let schema = metrics
        .iter()
        .map(|m| {
            format!(
                "  \"{}\": {{\"score\": <1-10>, \"reason\": \"<detailed explanation>\", \"evidence\": [\"<verbatim quote>\"]}}",
                m.name()
            )
        })
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        r#"You are an expert educational evaluator analyzing a mentor's teaching quality.

Topic: {topic}
Session title: {title}

Transcript Segment:
"{segment_text}"

Evaluate the following aspects of this teaching segment (score 1-10 each with detailed justification):

{criteria}

Return your evaluation in the following JSON format:
{{
{schema}
}}

Provide ONLY the JSON response, no additional text."#
    )
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use mindtrace_core::ScoringConfig;
    use mindtrace_llm::{
        GatewayConfig, ProviderCallError, ProviderClient, ProviderId,
    };

    use super::*;

    struct StaticProvider(String);

    #[async_trait]
    impl ProviderClient for StaticProvider {
        fn id(&self) -> ProviderId {
            ProviderId::Gemini
        }

        async fn generate(
            &self,
            _prompt: &str,
            _temperature: f32,
            _structured: bool,
        ) -> Result<String, ProviderCallError> {
            Ok(self.0.clone())
        }
    }

    fn segment() -> LogicalSegment {
        LogicalSegment {
            id: 0,
            text: "Decorators wrap functions.".to_string(),
            start_time: 0.0,
            end_time: 30.0,
            confidence: 0.95,
        }
    }

    fn evaluator_with(raw: &str) -> SegmentEvaluator {
        let config = GatewayConfig {
            backoff_base: std::time::Duration::ZERO,
            ..GatewayConfig::default()
        };
        let gateway =
            Gateway::new(config).with_provider(Arc::new(StaticProvider(raw.to_string())));
        SegmentEvaluator::new(Arc::new(gateway), ScoringEngine::default())
    }

    fn full_response() -> String {
        let entries: Vec<String> = Metric::ALL
            .iter()
            .map(|m| {
                format!(
                    "\"{}\": {{\"score\": 8.0, \"reason\": \"solid\", \"evidence\": [\"q\"]}}",
                    m.name()
                )
            })
            .collect();
        format!("{{{}}}", entries.join(","))
    }

    #[tokio::test]
    async fn valid_response_is_accepted() {
        let evaluator = evaluator_with(&full_response());
        let verdict = evaluator.evaluate(&segment(), "decorators", "intro").await;
        assert_eq!(verdict.provider, "gemini");
        assert_eq!(verdict.evaluation.metrics.len(), Metric::ALL.len());
        assert_eq!(verdict.evaluation.overall_segment_score, 8.0);
        assert_eq!(
            verdict.evaluation.metrics[&Metric::Clarity].evidence,
            vec!["q".to_string()]
        );
    }

    #[tokio::test]
    async fn out_of_range_score_triggers_synthetic_fallback() {
        let bad = full_response().replace("\"score\": 8.0", "\"score\": 14.0");
        let evaluator = evaluator_with(&bad);
        let verdict = evaluator.evaluate(&segment(), "decorators", "intro").await;
        assert_eq!(verdict.provider, SYNTHETIC_PROVIDER);
        assert!(
            verdict.evaluation.metrics[&Metric::Clarity]
                .reason
                .contains("Synthetic fallback")
        );
    }

    #[tokio::test]
    async fn empty_reason_discards_whole_result() {
        let bad = full_response().replace("\"reason\": \"solid\"", "\"reason\": \"  \"");
        let evaluator = evaluator_with(&bad);
        let verdict = evaluator.evaluate(&segment(), "decorators", "intro").await;
        assert_eq!(verdict.provider, SYNTHETIC_PROVIDER);
    }

    #[tokio::test]
    async fn synthetic_fallback_is_deterministic() {
        let evaluator = evaluator_with("not json at all");
        let a = evaluator.evaluate(&segment(), "t", "t").await;
        let b = evaluator.evaluate(&segment(), "t", "t").await;
        assert_eq!(
            serde_json::to_value(&a.evaluation).unwrap(),
            serde_json::to_value(&b.evaluation).unwrap()
        );
    }
}
