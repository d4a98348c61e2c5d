//! Session evaluation pipeline: transcription, segmentation, LLM
//! scoring and persistence, driven by a single controller.

pub mod controller;
pub mod error;
pub mod evaluator;
pub mod store;
pub mod transcribe;

pub use controller::{PipelineConfig, PipelineController, RunHandle};
pub use error::PipelineError;
pub use evaluator::{SegmentEvaluator, SegmentVerdict, SYNTHETIC_PROVIDER};
pub use store::{ClaimOutcome, MemoryStore, SessionStore, StoreError};
pub use transcribe::{DemoTranscriber, Transcriber, TranscriptionError, WhisperApiTranscriber};
