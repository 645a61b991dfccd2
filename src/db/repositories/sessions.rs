use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    helpers::{parse_datetime, parse_optional_datetime, parse_status},
    Database,
};
use crate::models::{Session, SessionStatus};

fn row_to_session(row: &Row) -> Result<Session> {
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;

    Ok(Session {
        id: row.get("id")?,
        status: parse_status(&status)?,
        created_at: parse_datetime(&created_at, "created_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
    })
}

impl Database {
    pub async fn insert_session(&self, session: &Session) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, status, created_at, ended_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id,
                    record.status.as_str(),
                    record.created_at.to_rfc3339(),
                    record.ended_at.as_ref().map(|dt| dt.to_rfc3339()),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, status, created_at, ended_at
                 FROM sessions
                 WHERE id = ?1",
            )?;

            let session = stmt
                .query_row(params![session_id], |row| Ok(row_to_session(row)))
                .optional()?
                .transpose()?;

            Ok(session)
        })
        .await
    }

    /// Marks an active session ended. Returns false when the session is unknown or
    /// already ended.
    pub async fn end_session(&self, session_id: &str, ended_at: DateTime<Utc>) -> Result<bool> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE sessions
                 SET status = ?1,
                     ended_at = ?2
                 WHERE id = ?3 AND status = ?4",
                params![
                    SessionStatus::Ended.as_str(),
                    ended_at.to_rfc3339(),
                    session_id,
                    SessionStatus::Active.as_str(),
                ],
            )?;
            Ok(rows_affected > 0)
        })
        .await
    }

    pub async fn get_active_sessions(&self) -> Result<Vec<Session>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, status, created_at, ended_at
                 FROM sessions
                 WHERE status = 'Active'
                 ORDER BY created_at DESC",
            )?;

            let mut rows = stmt.query([])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }

            Ok(sessions)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> Session {
        Session {
            id: id.to_string(),
            status: SessionStatus::Active,
            created_at: Utc::now(),
            ended_at: None,
        }
    }

    #[tokio::test]
    async fn insert_get_and_end() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("db.sqlite3")).unwrap();

        let record = session("session_1");
        db.insert_session(&record).await.unwrap();

        let stored = db.get_session("session_1").await.unwrap().unwrap();
        assert_eq!(stored, record);
        assert_eq!(db.get_active_sessions().await.unwrap().len(), 1);

        assert!(db.end_session("session_1", Utc::now()).await.unwrap());
        // ending twice is reported as a no-op
        assert!(!db.end_session("session_1", Utc::now()).await.unwrap());

        let ended = db.get_session("session_1").await.unwrap().unwrap();
        assert_eq!(ended.status, SessionStatus::Ended);
        assert!(ended.ended_at.is_some());
        assert!(db.get_active_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_session_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("db.sqlite3")).unwrap();

        assert!(db.get_session("missing").await.unwrap().is_none());
        assert!(!db.end_session("missing", Utc::now()).await.unwrap());
    }
}
