use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use mindtrace_core::{Evaluation, Session, SessionStatus, Transcript};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Outcome of the atomic trigger claim.
#[derive(Debug)]
pub enum ClaimOutcome {
    /// Session moved to `Transcribing`; the caller owns the run.
    Claimed(Session),
    /// Another run holds the session, or it is already evaluated.
    Rejected(SessionStatus),
}

/// Persistence boundary for sessions, transcripts and evaluations.
/// Keyed by opaque ids; no multi-document transactions are assumed.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: Session) -> Result<(), StoreError>;

    async fn session(&self, id: Uuid) -> Result<Option<Session>, StoreError>;

    /// Conditional status update `Uploaded | Failed -> Transcribing`.
    /// This is the only guard against a duplicate trigger racing the
    /// first run, so it must be atomic, not a read-then-write.
    async fn claim_session(&self, id: Uuid) -> Result<ClaimOutcome, StoreError>;

    async fn update_session(&self, session: &Session) -> Result<(), StoreError>;

    async fn save_transcript(&self, transcript: &Transcript) -> Result<(), StoreError>;

    async fn transcript(&self, id: Uuid) -> Result<Option<Transcript>, StoreError>;

    async fn save_evaluation(&self, evaluation: &Evaluation) -> Result<(), StoreError>;

    /// Most recent evaluation for a session; re-runs supersede older
    /// documents rather than mutating them.
    async fn evaluation_for_session(
        &self,
        session_id: Uuid,
    ) -> Result<Option<Evaluation>, StoreError>;
}

#[derive(Default)]
struct MemoryState {
    sessions: HashMap<Uuid, Session>,
    transcripts: HashMap<Uuid, Transcript>,
    evaluations: Vec<Evaluation>,
}

/// In-memory store used by the CLI and tests. A single lock over the
/// state makes the claim trivially atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn evaluation_count(&self) -> usize {
        self.state.lock().await.evaluations.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, session: Session) -> Result<(), StoreError> {
        self.state.lock().await.sessions.insert(session.id, session);
        Ok(())
    }

    async fn session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self.state.lock().await.sessions.get(&id).cloned())
    }

    async fn claim_session(&self, id: Uuid) -> Result<ClaimOutcome, StoreError> {
        let mut state = self.state.lock().await;
        let session = state
            .sessions
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;

        match session.status {
            SessionStatus::Uploaded | SessionStatus::Failed => {
                session.status = SessionStatus::Transcribing;
                session.updated_at = chrono::Utc::now();
                Ok(ClaimOutcome::Claimed(session.clone()))
            }
            other => Ok(ClaimOutcome::Rejected(other)),
        }
    }

    async fn update_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.sessions.contains_key(&session.id) {
            return Err(StoreError::SessionNotFound(session.id));
        }
        state.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn save_transcript(&self, transcript: &Transcript) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .transcripts
            .insert(transcript.id, transcript.clone());
        Ok(())
    }

    async fn transcript(&self, id: Uuid) -> Result<Option<Transcript>, StoreError> {
        Ok(self.state.lock().await.transcripts.get(&id).cloned())
    }

    async fn save_evaluation(&self, evaluation: &Evaluation) -> Result<(), StoreError> {
        self.state.lock().await.evaluations.push(evaluation.clone());
        Ok(())
    }

    async fn evaluation_for_session(
        &self,
        session_id: Uuid,
    ) -> Result<Option<Evaluation>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .evaluations
            .iter()
            .filter(|e| e.session_id == session_id)
            .max_by_key(|e| e.created_at)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claim_succeeds_once_then_rejects() {
        let store = MemoryStore::new();
        let session = Session::new("t", "topic", "media.mp4");
        let id = session.id;
        store.create_session(session).await.unwrap();

        assert!(matches!(
            store.claim_session(id).await.unwrap(),
            ClaimOutcome::Claimed(_)
        ));
        assert!(matches!(
            store.claim_session(id).await.unwrap(),
            ClaimOutcome::Rejected(SessionStatus::Transcribing)
        ));
    }

    #[tokio::test]
    async fn failed_session_can_be_reclaimed() {
        let store = MemoryStore::new();
        let mut session = Session::new("t", "topic", "media.mp4");
        session.status = SessionStatus::Failed;
        let id = session.id;
        store.create_session(session).await.unwrap();

        assert!(matches!(
            store.claim_session(id).await.unwrap(),
            ClaimOutcome::Claimed(_)
        ));
    }

    #[tokio::test]
    async fn claim_of_unknown_session_is_an_error() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.claim_session(Uuid::new_v4()).await,
            Err(StoreError::SessionNotFound(_))
        ));
    }
}
