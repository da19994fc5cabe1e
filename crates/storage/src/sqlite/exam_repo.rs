use prep_core::model::{MockExam, MockExamId, QuestionId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    conn, id_to_i64, map_mock_exam_row, mock_exam_id_from_i64, question_id_from_i64, ser,
};
use crate::repository::{MockExamRepository, NewMockExamRecord, StorageError};

#[async_trait::async_trait]
impl MockExamRepository for SqliteRepository {
    async fn insert_mock_exam(&self, exam: NewMockExamRecord) -> Result<MockExamId, StorageError> {
        let exam_type_id = exam
            .exam_type_id
            .map(|e| id_to_i64("exam_type_id", e.value()))
            .transpose()?;
        let res = sqlx::query(
            r"
            INSERT INTO mock_exams (name, exam_type_id, duration_minutes, total_questions, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(exam.name)
        .bind(exam_type_id)
        .bind(i64::from(exam.duration_minutes))
        .bind(i64::from(exam.total_questions))
        .bind(exam.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        mock_exam_id_from_i64(res.last_insert_rowid())
    }

    async fn get_mock_exam(&self, id: MockExamId) -> Result<Option<MockExam>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, name, exam_type_id, duration_minutes, total_questions, created_at
            FROM mock_exams WHERE id = ?1
            ",
        )
        .bind(id_to_i64("mock_exam_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;
        row.as_ref().map(map_mock_exam_row).transpose()
    }

    async fn list_mock_exams(&self) -> Result<Vec<MockExam>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, name, exam_type_id, duration_minutes, total_questions, created_at
            FROM mock_exams
            ORDER BY created_at DESC, id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        rows.iter().map(map_mock_exam_row).collect()
    }

    async fn set_exam_questions(
        &self,
        exam: MockExamId,
        questions: &[QuestionId],
    ) -> Result<(), StorageError> {
        let exam_id = id_to_i64("mock_exam_id", exam.value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let exists = sqlx::query("SELECT 1 FROM mock_exams WHERE id = ?1")
            .bind(exam_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        sqlx::query("DELETE FROM mock_questions WHERE mock_exam_id = ?1")
            .bind(exam_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (order, question) in (0_i64..).zip(questions) {
            sqlx::query(
                r"
                INSERT INTO mock_questions (mock_exam_id, question_id, question_order)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(exam_id)
            .bind(id_to_i64("question_id", question.value())?)
            .bind(order)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    StorageError::NotFound
                }
                sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
                other => conn(other),
            })?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn exam_question_ids(&self, exam: MockExamId) -> Result<Vec<QuestionId>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT question_id FROM mock_questions
            WHERE mock_exam_id = ?1
            ORDER BY question_order ASC
            ",
        )
        .bind(id_to_i64("mock_exam_id", exam.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| question_id_from_i64(row.try_get("question_id").map_err(ser)?))
            .collect()
    }
}
