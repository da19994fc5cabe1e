use prep_core::model::{ProgressRecord, StreakRecord, TopicId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_progress_row, map_streak_row};
use crate::repository::{ProgressRepository, StorageError, StreakRepository};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        user: UserId,
        topic: TopicId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT topic_id, questions_attempted, questions_correct, last_practiced_at
            FROM user_progress
            WHERE user_id = ?1 AND topic_id = ?2
            ",
        )
        .bind(user.as_uuid())
        .bind(id_to_i64("topic_id", topic.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;
        row.as_ref().map(map_progress_row).transpose()
    }

    async fn upsert_progress(
        &self,
        user: UserId,
        record: &ProgressRecord,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO user_progress (
                user_id, topic_id, questions_attempted, questions_correct, last_practiced_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id, topic_id) DO UPDATE SET
                questions_attempted = excluded.questions_attempted,
                questions_correct = excluded.questions_correct,
                last_practiced_at = excluded.last_practiced_at
            ",
        )
        .bind(user.as_uuid())
        .bind(id_to_i64("topic_id", record.topic_id().value())?)
        .bind(i64::from(record.questions_attempted()))
        .bind(i64::from(record.questions_correct()))
        .bind(record.last_practiced_at())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            other => conn(other),
        })?;
        Ok(())
    }

    async fn progress_for_user(&self, user: UserId) -> Result<Vec<ProgressRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT topic_id, questions_attempted, questions_correct, last_practiced_at
            FROM user_progress
            WHERE user_id = ?1
            ORDER BY topic_id ASC
            ",
        )
        .bind(user.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        rows.iter().map(map_progress_row).collect()
    }
}

#[async_trait::async_trait]
impl StreakRepository for SqliteRepository {
    async fn get_streak(&self, user: UserId) -> Result<Option<StreakRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT current_streak, longest_streak, last_practice_date, total_practice_days
            FROM user_streaks WHERE user_id = ?1
            ",
        )
        .bind(user.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;
        row.as_ref().map(map_streak_row).transpose()
    }

    async fn put_streak(&self, user: UserId, record: &StreakRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO user_streaks (
                user_id, current_streak, longest_streak, last_practice_date, total_practice_days
            )
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id) DO UPDATE SET
                current_streak = excluded.current_streak,
                longest_streak = excluded.longest_streak,
                last_practice_date = excluded.last_practice_date,
                total_practice_days = excluded.total_practice_days
            ",
        )
        .bind(user.as_uuid())
        .bind(i64::from(record.current_streak()))
        .bind(i64::from(record.longest_streak()))
        .bind(record.last_practice_date())
        .bind(i64::from(record.total_practice_days()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }
}
