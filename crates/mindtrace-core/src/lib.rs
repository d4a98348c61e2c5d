pub mod config;
pub mod metric;
pub mod scoring;
pub mod segmentation;
pub mod types;

pub use config::{ScoringConfig, SegmenterConfig};
pub use metric::Metric;
pub use scoring::{AlignmentReport, AlignmentTier, EvaluationSummary, ScoringEngine};
pub use segmentation::Segmenter;
pub use types::{
    Evaluation, LogicalSegment, MetricScore, SegmentEvaluation, Session, SessionMetrics,
    SessionStatus, Transcript, TranscriptFragment,
};
