use serde::{Deserialize, Serialize};

/// The canonical 13-dimension scheme for judging a teaching segment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Clarity,
    Structure,
    Correctness,
    Pacing,
    Communication,
    Engagement,
    Examples,
    Questioning,
    Adaptability,
    Relevance,
    Depth,
    Empathy,
    Confidence,
}

impl Metric {
    pub const ALL: [Metric; 13] = [
        Metric::Clarity,
        Metric::Structure,
        Metric::Correctness,
        Metric::Pacing,
        Metric::Communication,
        Metric::Engagement,
        Metric::Examples,
        Metric::Questioning,
        Metric::Adaptability,
        Metric::Relevance,
        Metric::Depth,
        Metric::Empathy,
        Metric::Confidence,
    ];

    /// Raw weights before normalization. They deliberately do not sum
    /// to 1.0; [`ScoringConfig`](crate::config::ScoringConfig)
    /// re-normalizes the enabled set at construction.
    pub const DEFAULT_WEIGHTS: [(Metric, f64); 13] = [
        (Metric::Clarity, 0.15),
        (Metric::Structure, 0.10),
        (Metric::Correctness, 0.15),
        (Metric::Pacing, 0.08),
        (Metric::Communication, 0.10),
        (Metric::Engagement, 0.08),
        (Metric::Examples, 0.08),
        (Metric::Questioning, 0.06),
        (Metric::Adaptability, 0.06),
        (Metric::Relevance, 0.10),
        (Metric::Depth, 0.08),
        (Metric::Empathy, 0.03),
        (Metric::Confidence, 0.03),
    ];

    /// Key used in prompts and provider responses.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Clarity => "clarity",
            Metric::Structure => "structure",
            Metric::Correctness => "correctness",
            Metric::Pacing => "pacing",
            Metric::Communication => "communication",
            Metric::Engagement => "engagement",
            Metric::Examples => "examples",
            Metric::Questioning => "questioning",
            Metric::Adaptability => "adaptability",
            Metric::Relevance => "relevance",
            Metric::Depth => "depth",
            Metric::Empathy => "empathy",
            Metric::Confidence => "confidence",
        }
    }

    /// Human-readable label for summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Clarity => "Clarity of explanations",
            Metric::Structure => "Structural organization",
            Metric::Correctness => "Technical accuracy",
            Metric::Pacing => "Pacing and delivery",
            Metric::Communication => "Communication effectiveness",
            Metric::Engagement => "Learner engagement",
            Metric::Examples => "Use of examples",
            Metric::Questioning => "Questioning technique",
            Metric::Adaptability => "Adaptability to the audience",
            Metric::Relevance => "Relevance to the topic",
            Metric::Depth => "Depth of coverage",
            Metric::Empathy => "Empathy with learners",
            Metric::Confidence => "Confidence of delivery",
        }
    }

    pub fn from_name(name: &str) -> Option<Metric> {
        Metric::ALL.iter().copied().find(|m| m.name() == name)
    }
}
