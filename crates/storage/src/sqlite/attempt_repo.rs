use prep_core::model::{AttemptId, AttemptResult, StoredAttempt, UserId};

use super::SqliteRepository;
use super::mapping::{answers_to_json, attempt_id_from_i64, conn, id_to_i64, map_attempt_row};
use crate::repository::{AttemptRepository, StorageError};

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn append_attempt(&self, attempt: &AttemptResult) -> Result<AttemptId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO user_mock_attempts (
                user_id, mock_exam_id, score, total_questions,
                time_taken_seconds, answers, completed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(attempt.user_id().as_uuid())
        .bind(id_to_i64("mock_exam_id", attempt.mock_exam_id().value())?)
        .bind(i64::from(attempt.score()))
        .bind(i64::from(attempt.total_questions()))
        .bind(i64::from(attempt.elapsed_secs()))
        .bind(answers_to_json(attempt.answers())?)
        .bind(attempt.completed_at())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            other => conn(other),
        })?;

        attempt_id_from_i64(res.last_insert_rowid())
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<Option<StoredAttempt>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, mock_exam_id, score, total_questions,
                   time_taken_seconds, answers, completed_at
            FROM user_mock_attempts WHERE id = ?1
            ",
        )
        .bind(id_to_i64("attempt_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;
        row.as_ref().map(map_attempt_row).transpose()
    }

    async fn attempts_for_user(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<StoredAttempt>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, mock_exam_id, score, total_questions,
                   time_taken_seconds, answers, completed_at
            FROM user_mock_attempts
            WHERE user_id = ?1
            ORDER BY completed_at DESC, id DESC
            LIMIT ?2
            ",
        )
        .bind(user.as_uuid())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        rows.iter().map(map_attempt_row).collect()
    }
}
