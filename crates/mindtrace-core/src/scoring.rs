use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ScoringConfig;
use crate::metric::Metric;
use crate::types::{Evaluation, MetricScore, SegmentEvaluation, SessionMetrics};

/// Qualitative topic-alignment tiers. Brief digressions land in the
/// upper tiers; only `Concerning` and `Poor` are penalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentTier {
    Excellent,
    Good,
    Acceptable,
    Concerning,
    Poor,
}

impl AlignmentTier {
    pub fn is_penalized(&self) -> bool {
        matches!(self, AlignmentTier::Concerning | AlignmentTier::Poor)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            AlignmentTier::Excellent => "fully on topic",
            AlignmentTier::Good => "on topic with brief digressions",
            AlignmentTier::Acceptable => "mostly on topic",
            AlignmentTier::Concerning => "noticeable topic drift",
            AlignmentTier::Poor => "sustained topic drift",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub off_topic_segments: usize,
    pub total_segments: usize,
    pub off_topic_fraction: f64,
    pub tier: AlignmentTier,
}

/// Derived read-model for one evaluation: what went well, what needs
/// work, and how well the session stayed on topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub overall_score: f64,
    pub metrics: SessionMetrics,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub alignment: AlignmentReport,
}

/// Aggregates per-segment metric scores into session-level results
/// using the normalized weight vector.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Weighted score for one segment, restricted to the metrics the
    /// segment actually reports.
    pub fn segment_score(&self, metrics: &BTreeMap<Metric, MetricScore>) -> f64 {
        let score = metrics
            .iter()
            .map(|(metric, detail)| self.config.weight(*metric) * detail.score)
            .sum();
        round2(score)
    }

    /// Session averages plus the weighted overall score. Each metric is
    /// averaged over only the segments that reported it; dividing by
    /// the total segment count would punish partially-reported metrics.
    pub fn aggregate(&self, segments: &[SegmentEvaluation]) -> (SessionMetrics, f64) {
        let mut sums: BTreeMap<Metric, (f64, usize)> = BTreeMap::new();
        for segment in segments {
            for (metric, detail) in &segment.metrics {
                let entry = sums.entry(*metric).or_insert((0.0, 0));
                entry.0 += detail.score;
                entry.1 += 1;
            }
        }

        let averages: BTreeMap<Metric, f64> = sums
            .into_iter()
            .map(|(metric, (total, count))| (metric, round2(total / count as f64)))
            .collect();

        let overall = round2(
            averages
                .iter()
                .map(|(metric, avg)| self.config.weight(*metric) * avg)
                .sum(),
        );

        debug!(
            segments = segments.len(),
            metrics = averages.len(),
            overall,
            "aggregated session metrics"
        );
        (SessionMetrics { averages }, overall)
    }

    /// Splits session averages into strengths and areas for
    /// improvement. Metrics with no reported value are skipped, never
    /// treated as weaknesses.
    pub fn classify(&self, metrics: &SessionMetrics) -> (Vec<String>, Vec<String>) {
        let mut strengths = Vec::new();
        let mut weaknesses = Vec::new();

        for metric in Metric::ALL {
            let Some(average) = metrics.get(metric) else {
                continue;
            };
            if average >= self.config.high_threshold {
                strengths.push(format!("{} (score: {average})", metric.label()));
            } else if average < self.config.low_threshold {
                weaknesses.push(format!("{} (score: {average})", metric.label()));
            }
        }

        (strengths, weaknesses)
    }

    /// Fraction of segments whose relevance falls below the floor,
    /// mapped onto the five alignment tiers. Segments that report no
    /// relevance score count as on topic.
    pub fn topic_alignment(&self, segments: &[SegmentEvaluation]) -> AlignmentReport {
        let total = segments.len();
        let off_topic = segments
            .iter()
            .filter(|segment| {
                segment
                    .metrics
                    .get(&Metric::Relevance)
                    .is_some_and(|detail| detail.score < self.config.relevance_floor)
            })
            .count();

        let fraction = if total == 0 {
            0.0
        } else {
            off_topic as f64 / total as f64
        };

        let tier = if fraction == 0.0 {
            AlignmentTier::Excellent
        } else if fraction <= self.config.acceptable_off_topic / 2.0 {
            AlignmentTier::Good
        } else if fraction <= self.config.acceptable_off_topic {
            AlignmentTier::Acceptable
        } else if fraction <= self.config.penalty_off_topic {
            AlignmentTier::Concerning
        } else {
            AlignmentTier::Poor
        };

        AlignmentReport {
            off_topic_segments: off_topic,
            total_segments: total,
            off_topic_fraction: fraction,
            tier,
        }
    }

    pub fn summarize(&self, evaluation: &Evaluation) -> EvaluationSummary {
        let (strengths, areas_for_improvement) = self.classify(&evaluation.metrics);
        EvaluationSummary {
            overall_score: evaluation.overall_score,
            metrics: evaluation.metrics.clone(),
            strengths,
            areas_for_improvement,
            alignment: self.topic_alignment(&evaluation.segments),
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
