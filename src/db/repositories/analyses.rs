use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    helpers::{parse_datetime, parse_emotion, row_to_vector},
    Database,
};
use crate::models::{ImageAnalysis, OverallAnalysis, SessionAnalysis};

fn row_to_overall(row: &Row) -> Result<(OverallAnalysis, DateTime<Utc>)> {
    let dominant: String = row.get("dominant_emotion")?;
    let created_at: String = row.get("created_at")?;

    Ok((
        OverallAnalysis {
            emotions: row_to_vector(row)?,
            dominant_emotion: parse_emotion(&dominant)?,
        },
        parse_datetime(&created_at, "created_at")?,
    ))
}

fn row_to_image(row: &Row) -> Result<ImageAnalysis> {
    let dominant: String = row.get("dominant_emotion")?;

    Ok(ImageAnalysis {
        image_path: row.get("image_path")?,
        emotions: row_to_vector(row)?,
        dominant_emotion: parse_emotion(&dominant)?,
        fallback: row.get("fallback")?,
    })
}

impl Database {
    /// Stores a session analysis unless one already exists for the session.
    ///
    /// Returns whether this call wrote the record. The existing record always wins, so
    /// two racing aggregations end up serving the same analysis.
    pub async fn insert_analysis_if_absent(&self, analysis: &SessionAnalysis) -> Result<bool> {
        let record = analysis.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let overall = &record.overall_analysis;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO session_analyses
                    (session_id, angry, disgust, fear, happy, sad, surprise, neutral, dominant_emotion, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.session_id,
                    overall.emotions.angry,
                    overall.emotions.disgust,
                    overall.emotions.fear,
                    overall.emotions.happy,
                    overall.emotions.sad,
                    overall.emotions.surprise,
                    overall.emotions.neutral,
                    overall.dominant_emotion.as_str(),
                    record.created_at.to_rfc3339(),
                ],
            )?;

            if inserted == 0 {
                return Ok(false);
            }

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO image_analyses
                        (session_id, position, image_path, angry, disgust, fear, happy, sad, surprise, neutral, dominant_emotion, fallback)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                )?;

                for (position, image) in record.image_analysis.iter().enumerate() {
                    stmt.execute(params![
                        record.session_id,
                        position as i64,
                        image.image_path,
                        image.emotions.angry,
                        image.emotions.disgust,
                        image.emotions.fear,
                        image.emotions.happy,
                        image.emotions.sad,
                        image.emotions.surprise,
                        image.emotions.neutral,
                        image.dominant_emotion.as_str(),
                        image.fallback,
                    ])
                    .with_context(|| format!("failed to insert image analysis {}", image.image_path))?;
                }
            }

            tx.commit()?;
            Ok(true)
        })
        .await
    }

    pub async fn get_analysis(&self, session_id: &str) -> Result<Option<SessionAnalysis>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let header = conn
                .query_row(
                    "SELECT session_id, angry, disgust, fear, happy, sad, surprise, neutral, dominant_emotion, created_at
                     FROM session_analyses
                     WHERE session_id = ?1",
                    params![session_id],
                    |row| Ok(row_to_overall(row)),
                )
                .optional()?
                .transpose()?;

            let Some((overall_analysis, created_at)) = header else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT image_path, angry, disgust, fear, happy, sad, surprise, neutral, dominant_emotion, fallback
                 FROM image_analyses
                 WHERE session_id = ?1
                 ORDER BY position ASC",
            )?;

            let mut rows = stmt.query(params![session_id])?;
            let mut image_analysis = Vec::new();
            while let Some(row) = rows.next()? {
                image_analysis.push(row_to_image(row)?);
            }

            Ok(Some(SessionAnalysis {
                session_id,
                image_analysis,
                overall_analysis,
                created_at,
            }))
        })
        .await
    }

    /// Session ids with a stored analysis, newest first.
    pub async fn list_analyzed_session_ids(&self) -> Result<Vec<String>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id FROM session_analyses ORDER BY created_at DESC",
            )?;

            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(ids)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Emotion, EmotionVector};

    fn sample(session_id: &str) -> SessionAnalysis {
        let mut happy = EmotionVector::zero();
        happy.happy = 66.67;
        happy.surprise = 33.33;

        SessionAnalysis::new(
            session_id.to_string(),
            vec![
                ImageAnalysis {
                    image_path: "2024-01-01_10-00-00-000_aaaa0000.png".into(),
                    dominant_emotion: happy.dominant(),
                    emotions: happy,
                    fallback: false,
                },
                ImageAnalysis {
                    image_path: "2024-01-01_10-00-03-000_bbbb1111.png".into(),
                    emotions: EmotionVector::neutral_fallback(),
                    dominant_emotion: Emotion::Neutral,
                    fallback: true,
                },
            ],
        )
    }

    #[tokio::test]
    async fn stored_analysis_reads_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("db.sqlite3")).unwrap();

        let analysis = sample("session_1");
        assert!(db.insert_analysis_if_absent(&analysis).await.unwrap());

        let stored = db.get_analysis("session_1").await.unwrap().unwrap();
        assert_eq!(stored, analysis);
    }

    #[tokio::test]
    async fn second_insert_keeps_first_record() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("db.sqlite3")).unwrap();

        let first = sample("session_1");
        let mut second = sample("session_1");
        second.image_analysis.truncate(1);

        assert!(db.insert_analysis_if_absent(&first).await.unwrap());
        assert!(!db.insert_analysis_if_absent(&second).await.unwrap());

        let stored = db.get_analysis("session_1").await.unwrap().unwrap();
        assert_eq!(stored.image_analysis.len(), 2);
    }

    #[tokio::test]
    async fn lists_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("db.sqlite3")).unwrap();

        let mut older = sample("session_old");
        older.created_at = older.created_at - chrono::Duration::minutes(5);
        db.insert_analysis_if_absent(&older).await.unwrap();
        db.insert_analysis_if_absent(&sample("session_new")).await.unwrap();

        assert_eq!(
            db.list_analyzed_session_ids().await.unwrap(),
            vec!["session_new".to_string(), "session_old".to_string()]
        );
        assert!(db.get_analysis("session_missing").await.unwrap().is_none());
    }
}
