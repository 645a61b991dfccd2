use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{info, warn};
use thiserror::Error;

use crate::{
    db::Database,
    models::{Session, SessionStatus},
    uploads::CaptureStore,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session ID is missing.")]
    Missing,

    #[error("Session {0} is not accepting uploads.")]
    NotActive(String),

    #[error("Session {0} not found.")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Issues session ids and tracks which sessions still accept captures.
///
/// State lives in the database, so every request names its session explicitly and
/// any number of players can be capturing at once.
#[derive(Clone)]
pub struct SessionRegistry {
    db: Database,
    store: CaptureStore,
    last_issued_ms: Arc<AtomicI64>,
}

impl SessionRegistry {
    pub fn new(db: Database, store: CaptureStore) -> Self {
        Self {
            db,
            store,
            last_issued_ms: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn store(&self) -> &CaptureStore {
        &self.store
    }

    pub async fn start_session(&self) -> Result<Session> {
        let created_at = Utc::now();
        let id = format!("session_{}", self.next_id_millis(created_at));

        self.store.create_session_dirs(&id).await?;

        let session = Session {
            id,
            status: SessionStatus::Active,
            created_at,
            ended_at: None,
        };
        self.db.insert_session(&session).await?;

        info!("Started {}", session.id);
        Ok(session)
    }

    /// Stops a session from accepting further uploads.
    ///
    /// Ending an already ended session is a no-op.
    pub async fn end_session(&self, session_id: &str) -> Result<Session, SessionError> {
        let ended = self.db.end_session(session_id, Utc::now()).await?;
        let session = self
            .db
            .get_session(session_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        if ended {
            info!("Ended {session_id}");
        }
        Ok(session)
    }

    /// Ends the session if it is still active so its capture set is final. Sessions
    /// that only exist on disk are left alone.
    pub async fn seal(&self, session_id: &str) -> Result<()> {
        if self.db.end_session(session_id, Utc::now()).await? {
            warn!("Sealed still-active {session_id} for analysis; its later uploads will be rejected");
        }
        Ok(())
    }

    pub async fn require_active(&self, session_id: Option<&str>) -> Result<Session, SessionError> {
        let session_id = session_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(SessionError::Missing)?;

        match self.db.get_session(session_id).await? {
            Some(session) if session.is_active() => Ok(session),
            Some(_) => Err(SessionError::NotActive(session_id.to_string())),
            None => Err(SessionError::NotFound(session_id.to_string())),
        }
    }

    /// Closes sessions left active by a previous run of the server.
    pub async fn recover_abandoned(&self) -> Result<usize> {
        let abandoned = self.db.get_active_sessions().await?;
        let now = Utc::now();

        for session in &abandoned {
            warn!(
                "Recovered abandoned session {} (started {}); marking as ended",
                session.id, session.created_at
            );
            self.db.end_session(&session.id, now).await?;
        }

        Ok(abandoned.len())
    }

    /// Millisecond timestamp for a new id, bumped past the previous one so ids stay
    /// unique even when two sessions start within the same millisecond.
    fn next_id_millis(&self, now: DateTime<Utc>) -> i64 {
        let candidate = now.timestamp_millis();
        let mut previous = self.last_issued_ms.load(Ordering::SeqCst);

        loop {
            let next = candidate.max(previous + 1);
            match self.last_issued_ms.compare_exchange(
                previous,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(actual) => previous = actual,
            }
        }
    }
}
