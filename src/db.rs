use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::models::{Lesson, LessonSummary, NewChatLog, Rubric};

pub type Db = Pool<Postgres>;

pub async fn connect(database_url: &str) -> Result<Db> {
    Ok(Pool::<Postgres>::connect(database_url).await?)
}

/// Read access to lessons and rubrics, plus the append-only scoring log.
/// Handlers depend on this trait so tests can substitute in-memory doubles.
#[async_trait]
pub trait LessonStore: Send + Sync {
    async fn list_lessons(&self) -> Result<Vec<LessonSummary>, sqlx::Error>;
    async fn fetch_lesson(&self, lesson_id: &str) -> Result<Option<Lesson>, sqlx::Error>;
    async fn rubrics_for_lesson(&self, lesson_id: &str) -> Result<Vec<Rubric>, sqlx::Error>;
    async fn insert_chat_log(&self, log: NewChatLog) -> Result<(), sqlx::Error>;
}

pub struct PgLessonStore {
    db: Db,
}

impl PgLessonStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LessonStore for PgLessonStore {
    async fn list_lessons(&self) -> Result<Vec<LessonSummary>, sqlx::Error> {
        sqlx::query_as::<_, LessonSummary>("SELECT id, title FROM lessons")
            .fetch_all(&self.db)
            .await
    }

    async fn fetch_lesson(&self, lesson_id: &str) -> Result<Option<Lesson>, sqlx::Error> {
        sqlx::query_as::<_, Lesson>(
            "SELECT id, title, system_prompt, evaluation_prompt FROM lessons WHERE id = $1",
        )
        .bind(lesson_id)
        .fetch_optional(&self.db)
        .await
    }

    async fn rubrics_for_lesson(&self, lesson_id: &str) -> Result<Vec<Rubric>, sqlx::Error> {
        sqlx::query_as::<_, Rubric>(
            "SELECT lesson_id, criterion, max_score FROM rubrics WHERE lesson_id = $1",
        )
        .bind(lesson_id)
        .fetch_all(&self.db)
        .await
    }

    async fn insert_chat_log(&self, log: NewChatLog) -> Result<(), sqlx::Error> {
        let chat_history = serde_json::to_value(&log.chat_history)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let scores =
            serde_json::to_value(&log.scores).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        sqlx::query(
            r#"
            INSERT INTO chat_logs (id, lesson_id, chat_history, scores, "timestamp", system_prompt, evaluation_prompt)
            VALUES ($1,$2,$3,$4,$5,$6,$7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&log.lesson_id)
        .bind(chat_history)
        .bind(scores)
        .bind(log.timestamp)
        .bind(&log.system_prompt)
        .bind(&log.evaluation_prompt)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}
