use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metric::Metric;

/// Atomic unit produced by the transcription capability. Ordered by
/// `start_time`, never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptFragment {
    pub id: u32,
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub confidence: f64,
}

/// A contiguous merge of one or more fragments, sized for independent
/// evaluation. Confidence is the mean of the constituent fragments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalSegment {
    pub id: u32,
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub confidence: f64,
}

/// Durable transcript artifact for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: Uuid,
    pub session_id: Uuid,
    pub full_text: String,
    pub segments: Vec<LogicalSegment>,
    pub created_at: DateTime<Utc>,
}

/// One judged dimension for one segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricScore {
    pub score: f64,
    pub reason: String,
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentEvaluation {
    pub segment_id: u32,
    pub text: String,
    pub metrics: BTreeMap<Metric, MetricScore>,
    pub overall_segment_score: f64,
}

/// Per-metric session averages. A metric reported by no segment is
/// absent from the map, not zero, so it cannot skew weighting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub averages: BTreeMap<Metric, f64>,
}

impl SessionMetrics {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.averages.get(&metric).copied()
    }
}

/// The durable artifact of one completed pipeline run. A re-run
/// supersedes the previous document rather than mutating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: Uuid,
    pub session_id: Uuid,
    pub overall_score: f64,
    pub metrics: SessionMetrics,
    pub segments: Vec<SegmentEvaluation>,
    pub provider_used: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Uploaded,
    Transcribing,
    Analyzing,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }

    /// Forward transitions only, except that any non-terminal state may
    /// fail. `Completed` and `Failed` accept nothing.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (Uploaded, Transcribing) => true,
            (Transcribing, Analyzing) => true,
            (Analyzing, Completed) => true,
            (Uploaded | Transcribing | Analyzing, Failed) => true,
            // A failed session may be re-triggered from scratch.
            (Failed, Transcribing) => true,
            _ => false,
        }
    }
}

/// The unit of work. Mutated only through status transitions; the
/// invariant `evaluation_ref.is_some() <=> status == Completed` is
/// owned by the pipeline controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub title: String,
    pub topic: String,
    pub media_locator: String,
    pub status: SessionStatus,
    pub transcript_ref: Option<Uuid>,
    pub evaluation_ref: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(title: impl Into<String>, topic: impl Into<String>, media_locator: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            topic: topic.into(),
            media_locator: media_locator.into(),
            status: SessionStatus::Uploaded,
            transcript_ref: None,
            evaluation_ref: None,
            created_at: now,
            updated_at: now,
        }
    }
}
