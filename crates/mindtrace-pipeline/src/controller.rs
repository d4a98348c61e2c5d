use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Semaphore, oneshot};
use tokio::task::JoinSet;
use tracing::{error, info};
use uuid::Uuid;

use mindtrace_core::{
    Evaluation, LogicalSegment, ScoringEngine, Segmenter, Session, SessionStatus, Transcript,
};
use mindtrace_llm::Gateway;

use crate::error::PipelineError;
use crate::evaluator::{SegmentEvaluator, SegmentVerdict};
use crate::store::{ClaimOutcome, SessionStore, StoreError};
use crate::transcribe::Transcriber;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on simultaneous segment evaluations, to stay under
    /// downstream provider rate limits.
    pub max_concurrent_evaluations: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_evaluations: 4,
        }
    }
}

/// Handle to one spawned pipeline run.
pub struct RunHandle {
    pub session_id: Uuid,
    pub done_rx: oneshot::Receiver<Result<Evaluation, PipelineError>>,
}

/// Drives a session through `Transcribing -> Analyzing -> Completed`,
/// persisting intermediate artifacts along the way. Any stage-level
/// error moves the session to `Failed`; artifacts persisted before the
/// failure are kept.
pub struct PipelineController {
    store: Arc<dyn SessionStore>,
    transcriber: Arc<dyn Transcriber>,
    segmenter: Segmenter,
    scoring: ScoringEngine,
    evaluator: SegmentEvaluator,
    config: PipelineConfig,
}

impl PipelineController {
    pub fn new(
        store: Arc<dyn SessionStore>,
        transcriber: Arc<dyn Transcriber>,
        gateway: Arc<Gateway>,
        segmenter: Segmenter,
        scoring: ScoringEngine,
        config: PipelineConfig,
    ) -> Self {
        let evaluator = SegmentEvaluator::new(gateway, scoring.clone());
        Self {
            store,
            transcriber,
            segmenter,
            scoring,
            evaluator,
            config,
        }
    }

    /// Claim the session and spawn its run as a background task. A
    /// session that is already running or completed rejects the
    /// trigger instead of starting a duplicate run.
    pub async fn trigger(self: &Arc<Self>, session_id: Uuid) -> Result<RunHandle, PipelineError> {
        let claim = self
            .store
            .claim_session(session_id)
            .await
            .map_err(map_store_error)?;

        let session = match claim {
            ClaimOutcome::Claimed(session) => session,
            ClaimOutcome::Rejected(SessionStatus::Completed) => {
                return Err(PipelineError::AlreadyCompleted);
            }
            ClaimOutcome::Rejected(status) => {
                return Err(PipelineError::AlreadyRunning(status));
            }
        };

        info!(session = %session_id, "evaluation run claimed");

        let controller = Arc::clone(self);
        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = controller.run(session).await;
            if let Err(err) = &result {
                error!(session = %session_id, error = %err, "evaluation run failed");
                controller.mark_failed(session_id).await;
            }
            let _ = done_tx.send(result);
        });

        Ok(RunHandle {
            session_id,
            done_rx,
        })
    }

    pub async fn evaluation_for_session(
        &self,
        session_id: Uuid,
    ) -> Result<Option<Evaluation>, PipelineError> {
        self.store
            .evaluation_for_session(session_id)
            .await
            .map_err(map_store_error)
    }

    async fn run(&self, mut session: Session) -> Result<Evaluation, PipelineError> {
        let (full_text, fragments) = self
            .transcriber
            .transcribe(&session.media_locator)
            .await?;
        info!(
            session = %session.id,
            fragments = fragments.len(),
            "transcription complete"
        );

        let segments = self.segmenter.segment(&fragments);
        let transcript = Transcript {
            id: Uuid::new_v4(),
            session_id: session.id,
            full_text,
            segments: segments.clone(),
            created_at: Utc::now(),
        };
        self.store
            .save_transcript(&transcript)
            .await
            .map_err(map_store_error)?;

        session.transcript_ref = Some(transcript.id);
        session.status = SessionStatus::Analyzing;
        session.updated_at = Utc::now();
        self.store
            .update_session(&session)
            .await
            .map_err(map_store_error)?;

        let verdicts = self
            .evaluate_segments(&segments, &session.topic, &session.title)
            .await?;

        let provider_used = dominant_provider(&verdicts);
        let segment_evaluations: Vec<_> =
            verdicts.into_iter().map(|v| v.evaluation).collect();
        let (metrics, overall_score) = self.scoring.aggregate(&segment_evaluations);

        let evaluation = Evaluation {
            id: Uuid::new_v4(),
            session_id: session.id,
            overall_score,
            metrics,
            segments: segment_evaluations,
            provider_used,
            created_at: Utc::now(),
        };
        self.store
            .save_evaluation(&evaluation)
            .await
            .map_err(map_store_error)?;

        session.status = SessionStatus::Completed;
        session.evaluation_ref = Some(evaluation.id);
        session.updated_at = Utc::now();
        self.store
            .update_session(&session)
            .await
            .map_err(map_store_error)?;

        info!(
            session = %session.id,
            overall = evaluation.overall_score,
            provider = %evaluation.provider_used,
            "evaluation complete"
        );
        Ok(evaluation)
    }

    /// Fan out segment evaluations up to the concurrency bound, then
    /// restore original segment order. A failed segment never aborts
    /// its siblings; the evaluator absorbs failures into synthetic
    /// fallbacks.
    async fn evaluate_segments(
        &self,
        segments: &[LogicalSegment],
        topic: &str,
        title: &str,
    ) -> Result<Vec<SegmentVerdict>, PipelineError> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_evaluations.max(1)));
        let mut join_set = JoinSet::new();

        for segment in segments.iter().cloned() {
            let evaluator = self.evaluator.clone();
            let semaphore = Arc::clone(&semaphore);
            let topic = topic.to_string();
            let title = title.to_string();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                evaluator.evaluate(&segment, &topic, &title).await
            });
        }

        let mut verdicts = Vec::with_capacity(segments.len());
        while let Some(joined) = join_set.join_next().await {
            verdicts.push(joined.map_err(|e| PipelineError::Internal(e.to_string()))?);
        }
        verdicts.sort_by_key(|v| v.evaluation.segment_id);
        Ok(verdicts)
    }

    /// Best-effort transition to `Failed`. Re-reads the session so
    /// artifacts persisted before the failure stay referenced.
    async fn mark_failed(&self, session_id: Uuid) {
        match self.store.session(session_id).await {
            Ok(Some(mut session)) if !session.status.is_terminal() => {
                session.status = SessionStatus::Failed;
                session.updated_at = Utc::now();
                if let Err(err) = self.store.update_session(&session).await {
                    error!(session = %session_id, error = %err, "could not mark session failed");
                }
            }
            Ok(_) => {}
            Err(err) => {
                error!(session = %session_id, error = %err, "could not load session to mark failed");
            }
        }
    }
}

fn map_store_error(error: StoreError) -> PipelineError {
    match error {
        StoreError::SessionNotFound(id) => PipelineError::SessionNotFound(id),
        other => PipelineError::Store(other),
    }
}

/// Most frequent provider label across the run, with a stable
/// tie-break. An all-fallback run reports its synthetic origin.
fn dominant_provider(verdicts: &[SegmentVerdict]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for verdict in verdicts {
        *counts.entry(verdict.provider.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(label, count)| (*count, std::cmp::Reverse(*label)))
        .map(|(label, _)| label.to_string())
        .unwrap_or_else(|| "mock".to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use mindtrace_core::{ScoringConfig, SegmenterConfig, TranscriptFragment};
    use mindtrace_llm::GatewayConfig;

    use crate::store::MemoryStore;
    use crate::transcribe::{DemoTranscriber, TranscriptionError};

    use super::*;

    struct SlowTranscriber {
        delay: Duration,
    }

    #[async_trait]
    impl Transcriber for SlowTranscriber {
        async fn transcribe(
            &self,
            media_locator: &str,
        ) -> Result<(String, Vec<TranscriptFragment>), TranscriptionError> {
            tokio::time::sleep(self.delay).await;
            DemoTranscriber.transcribe(media_locator).await
        }
    }

    struct FailingTranscriber;

    #[async_trait]
    impl Transcriber for FailingTranscriber {
        async fn transcribe(
            &self,
            _media_locator: &str,
        ) -> Result<(String, Vec<TranscriptFragment>), TranscriptionError> {
            Err(TranscriptionError::Api {
                status: 500,
                message: "upstream unavailable".to_string(),
            })
        }
    }

    /// Twelve dense fragments so the segmenter produces several
    /// logical segments.
    struct ManyFragmentTranscriber;

    #[async_trait]
    impl Transcriber for ManyFragmentTranscriber {
        async fn transcribe(
            &self,
            _media_locator: &str,
        ) -> Result<(String, Vec<TranscriptFragment>), TranscriptionError> {
            let fragments: Vec<_> = (0..12)
                .map(|i| TranscriptFragment {
                    id: i,
                    text: vec!["word"; 300].join(" "),
                    start_time: i as f64 * 30.0,
                    end_time: (i + 1) as f64 * 30.0,
                    confidence: 0.9,
                })
                .collect();
            let full_text = fragments
                .iter()
                .map(|f| f.text.clone())
                .collect::<Vec<_>>()
                .join(" ");
            Ok((full_text, fragments))
        }
    }

    fn degraded_gateway() -> Arc<Gateway> {
        Arc::new(Gateway::new(GatewayConfig {
            permit_degraded: true,
            backoff_base: Duration::ZERO,
            ..GatewayConfig::default()
        }))
    }

    fn controller_with(
        store: Arc<MemoryStore>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Arc<PipelineController> {
        Arc::new(PipelineController::new(
            store,
            transcriber,
            degraded_gateway(),
            Segmenter::new(SegmenterConfig::default()),
            ScoringEngine::new(ScoringConfig::default()),
            PipelineConfig::default(),
        ))
    }

    async fn new_session(store: &MemoryStore) -> Uuid {
        let session = Session::new("Intro to decorators", "Python decorators", "demo.mp4");
        let id = session.id;
        store.create_session(session).await.unwrap();
        id
    }

    #[tokio::test]
    async fn run_completes_and_sets_evaluation_ref() {
        let store = Arc::new(MemoryStore::new());
        let controller = controller_with(store.clone(), Arc::new(DemoTranscriber));
        let id = new_session(&store).await;

        let handle = controller.trigger(id).await.unwrap();
        let evaluation = handle.done_rx.await.unwrap().unwrap();

        let session = store.session(id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.evaluation_ref, Some(evaluation.id));
        assert!(session.transcript_ref.is_some());
        assert_eq!(evaluation.provider_used, "mock");
        assert!(!evaluation.segments.is_empty());
        // The degraded-mode mock scores every metric 7.0.
        assert_eq!(evaluation.overall_score, 7.0);
    }

    #[tokio::test]
    async fn duplicate_trigger_is_rejected_while_running() {
        let store = Arc::new(MemoryStore::new());
        let controller = controller_with(
            store.clone(),
            Arc::new(SlowTranscriber {
                delay: Duration::from_millis(200),
            }),
        );
        let id = new_session(&store).await;

        let handle = controller.trigger(id).await.unwrap();
        let second = controller.trigger(id).await;
        assert!(matches!(
            second,
            Err(PipelineError::AlreadyRunning(SessionStatus::Transcribing))
        ));

        handle.done_rx.await.unwrap().unwrap();
        assert!(matches!(
            controller.trigger(id).await,
            Err(PipelineError::AlreadyCompleted)
        ));
        assert_eq!(store.evaluation_count().await, 1);
    }

    #[tokio::test]
    async fn transcription_failure_marks_session_failed() {
        let store = Arc::new(MemoryStore::new());
        let controller = controller_with(store.clone(), Arc::new(FailingTranscriber));
        let id = new_session(&store).await;

        let handle = controller.trigger(id).await.unwrap();
        let result = handle.done_rx.await.unwrap();
        assert!(matches!(result, Err(PipelineError::Transcription(_))));

        let session = store.session(id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
        assert!(session.evaluation_ref.is_none());
        assert!(controller.evaluation_for_session(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_session_can_be_retriggered_from_scratch() {
        let store = Arc::new(MemoryStore::new());
        let failing = controller_with(store.clone(), Arc::new(FailingTranscriber));
        let id = new_session(&store).await;

        let handle = failing.trigger(id).await.unwrap();
        assert!(handle.done_rx.await.unwrap().is_err());

        let working = controller_with(store.clone(), Arc::new(DemoTranscriber));
        let handle = working.trigger(id).await.unwrap();
        handle.done_rx.await.unwrap().unwrap();

        let session = store.session(id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn persisted_segments_are_ordered_by_segment_id() {
        let store = Arc::new(MemoryStore::new());
        let controller = controller_with(store.clone(), Arc::new(ManyFragmentTranscriber));
        let id = new_session(&store).await;

        let handle = controller.trigger(id).await.unwrap();
        let evaluation = handle.done_rx.await.unwrap().unwrap();

        assert!(evaluation.segments.len() > 1);
        let ids: Vec<u32> = evaluation.segments.iter().map(|s| s.segment_id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }

    #[tokio::test]
    async fn unknown_session_trigger_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let controller = controller_with(store.clone(), Arc::new(DemoTranscriber));
        assert!(matches!(
            controller.trigger(Uuid::new_v4()).await,
            Err(PipelineError::SessionNotFound(_))
        ));
    }
}
