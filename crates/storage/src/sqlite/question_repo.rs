use std::collections::HashMap;

use prep_core::model::{Question, QuestionId, TopicId, ValidatedQuestion};
use sqlx::{QueryBuilder, Sqlite};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_question_row, question_id_from_i64};
use crate::repository::{QuestionRepository, StorageError};

const QUESTION_COLUMNS: &str = "id, topic_id, exam_type_id, question_text, option_a, option_b, \
     option_c, option_d, correct_answer, explanation, difficulty, created_at";

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn insert_questions(
        &self,
        questions: &[ValidatedQuestion],
    ) -> Result<Vec<QuestionId>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        let mut ids = Vec::with_capacity(questions.len());

        for question in questions {
            let exam_type_id = question
                .exam_type_id
                .map(|e| id_to_i64("exam_type_id", e.value()))
                .transpose()?;
            let res = sqlx::query(
                r"
                INSERT INTO questions (
                    topic_id, exam_type_id, question_text,
                    option_a, option_b, option_c, option_d,
                    correct_answer, explanation, difficulty, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ",
            )
            .bind(id_to_i64("topic_id", question.topic_id.value())?)
            .bind(exam_type_id)
            .bind(&question.prompt)
            .bind(&question.options.a)
            .bind(&question.options.b)
            .bind(&question.options.c)
            .bind(&question.options.d)
            .bind(question.correct.as_str())
            .bind(question.explanation.as_deref())
            .bind(question.difficulty.map(|d| d.as_str()))
            .bind(question.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    StorageError::NotFound
                }
                other => conn(other),
            })?;
            ids.push(question_id_from_i64(res.last_insert_rowid())?);
        }

        tx.commit().await.map_err(conn)?;
        Ok(ids)
    }

    async fn questions_for_topic(
        &self,
        topic: TopicId,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError> {
        let sql = format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE topic_id = ?1 ORDER BY id ASC LIMIT ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(id_to_i64("topic_id", topic.value())?)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter().map(map_question_row).collect()
    }

    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id IN ("
        ));
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id_to_i64("question_id", id.value())?);
        }
        separated.push_unseparated(")");

        let rows = qb.build().fetch_all(&self.pool).await.map_err(conn)?;
        let mut by_id: HashMap<QuestionId, Question> = HashMap::with_capacity(rows.len());
        for row in &rows {
            let question = map_question_row(row)?;
            by_id.insert(question.id, question);
        }
        Ok(ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
    }

    async fn recent_questions(
        &self,
        topic: Option<TopicId>,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError> {
        let topic = topic
            .map(|t| id_to_i64("topic_id", t.value()))
            .transpose()?;
        let sql = format!(
            "SELECT {QUESTION_COLUMNS} FROM questions \
             WHERE ?1 IS NULL OR topic_id = ?1 \
             ORDER BY created_at DESC, id DESC LIMIT ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(topic)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter().map(map_question_row).collect()
    }

    async fn delete_question(&self, id: QuestionId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM questions WHERE id = ?1")
            .bind(id_to_i64("question_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
