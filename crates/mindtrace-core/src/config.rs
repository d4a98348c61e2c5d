use std::collections::BTreeMap;

use crate::metric::Metric;

/// Segmentation thresholds. Word bounds are soft targets: a single
/// oversized fragment is never split.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    pub min_segment_words: usize,
    pub max_segment_words: usize,
    /// Inputs at or below this fragment count pass through unchanged.
    pub passthrough_fragments: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        // Tuned for ~90-minute sessions: ~30-35 logical segments.
        Self {
            min_segment_words: 250,
            max_segment_words: 600,
            passthrough_fragments: 5,
        }
    }
}

/// Scoring weights and thresholds. Weights are re-normalized to sum to
/// 1.0 at construction, so enabling or disabling metric groups never
/// changes the scale of the overall score.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    weights: BTreeMap<Metric, f64>,
    pub high_threshold: f64,
    pub low_threshold: f64,
    /// Relevance score below which a segment counts as off topic.
    pub relevance_floor: f64,
    /// Off-topic fraction still considered acceptable.
    pub acceptable_off_topic: f64,
    /// Off-topic fraction beyond which alignment is penalized outright.
    pub penalty_off_topic: f64,
}

impl ScoringConfig {
    pub fn new(raw_weights: &[(Metric, f64)]) -> Self {
        let total: f64 = raw_weights.iter().map(|(_, w)| w).sum();
        let weights = raw_weights
            .iter()
            .filter(|(_, w)| *w > 0.0)
            .map(|(m, w)| (*m, if total > 0.0 { w / total } else { 0.0 }))
            .collect();
        Self {
            weights,
            high_threshold: 8.0,
            low_threshold: 6.5,
            relevance_floor: 5.0,
            acceptable_off_topic: 0.15,
            penalty_off_topic: 0.30,
        }
    }

    /// Normalized weight for a metric; zero when the metric is disabled.
    pub fn weight(&self, metric: Metric) -> f64 {
        self.weights.get(&metric).copied().unwrap_or(0.0)
    }

    pub fn enabled_metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.weights.keys().copied()
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self::new(&Metric::DEFAULT_WEIGHTS)
    }
}
