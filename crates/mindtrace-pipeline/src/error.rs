use uuid::Uuid;

use crate::store::StoreError;
use crate::transcribe::TranscriptionError;
use mindtrace_core::SessionStatus;
use mindtrace_llm::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    #[error("evaluation already in progress (status: {0:?})")]
    AlreadyRunning(SessionStatus),

    #[error("session already evaluated")]
    AlreadyCompleted,

    #[error("transcription failed: {0}")]
    Transcription(#[from] TranscriptionError),

    #[error("gateway failure: {0}")]
    Gateway(#[from] GatewayError),

    #[error("persistence failure: {0}")]
    Store(#[from] StoreError),

    #[error("pipeline task failed: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
