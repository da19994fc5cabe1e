use prep_core::model::{
    ExamType, Subject, SubjectId, Topic, TopicId, Track, TrackColor, TrackId,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use super::SqliteRepository;
use super::mapping::{
    conn, exam_type_id_from_i64, id_to_i64, ser, subject_id_from_i64, topic_id_from_i64,
    track_id_from_i64,
};
use crate::repository::{CatalogRepository, StorageError};

fn exam_type_from_row(row: &SqliteRow) -> Result<ExamType, StorageError> {
    ExamType::new(
        exam_type_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<String, _>("description").map_err(ser)?,
    )
    .map_err(ser)
}

fn track_from_row(row: &SqliteRow) -> Result<Track, StorageError> {
    let color: String = row.try_get("color").map_err(ser)?;
    Track::new(
        track_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        color.parse::<TrackColor>().map_err(ser)?,
    )
    .map_err(ser)
}

fn subject_from_row(row: &SqliteRow) -> Result<Subject, StorageError> {
    Subject::new(
        subject_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<Option<i64>, _>("track_id")
            .map_err(ser)?
            .map(track_id_from_i64)
            .transpose()?,
        row.try_get::<i64, _>("is_compulsory").map_err(ser)? != 0,
    )
    .map_err(ser)
}

fn topic_from_row(row: &SqliteRow) -> Result<Topic, StorageError> {
    Topic::new(
        topic_id_from_i64(row.try_get("id").map_err(ser)?)?,
        subject_id_from_i64(row.try_get("subject_id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<Option<String>, _>("description").map_err(ser)?,
    )
    .map_err(ser)
}

#[async_trait::async_trait]
impl CatalogRepository for SqliteRepository {
    async fn upsert_exam_type(&self, exam_type: &ExamType) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO exam_types (id, name, description)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description
            ",
        )
        .bind(id_to_i64("exam_type_id", exam_type.id.value())?)
        .bind(&exam_type.name)
        .bind(&exam_type.description)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn list_exam_types(&self) -> Result<Vec<ExamType>, StorageError> {
        let rows = sqlx::query("SELECT id, name, description FROM exam_types ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter().map(exam_type_from_row).collect()
    }

    async fn upsert_track(&self, track: &Track) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO tracks (id, name, color)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                color = excluded.color
            ",
        )
        .bind(id_to_i64("track_id", track.id.value())?)
        .bind(&track.name)
        .bind(track.color.as_str())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn get_track(&self, id: TrackId) -> Result<Option<Track>, StorageError> {
        let row = sqlx::query("SELECT id, name, color FROM tracks WHERE id = ?1")
            .bind(id_to_i64("track_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        row.as_ref().map(track_from_row).transpose()
    }

    async fn list_tracks(&self) -> Result<Vec<Track>, StorageError> {
        let rows = sqlx::query("SELECT id, name, color FROM tracks ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter().map(track_from_row).collect()
    }

    async fn upsert_subject(&self, subject: &Subject) -> Result<(), StorageError> {
        let track_id = subject
            .track_id
            .map(|t| id_to_i64("track_id", t.value()))
            .transpose()?;
        sqlx::query(
            r"
            INSERT INTO subjects (id, name, track_id, is_compulsory)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                track_id = excluded.track_id,
                is_compulsory = excluded.is_compulsory
            ",
        )
        .bind(id_to_i64("subject_id", subject.id.value())?)
        .bind(&subject.name)
        .bind(track_id)
        .bind(i64::from(subject.is_compulsory))
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn subjects_for_track(&self, track: TrackId) -> Result<Vec<Subject>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, name, track_id, is_compulsory
            FROM subjects
            WHERE is_compulsory = 1 OR track_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_to_i64("track_id", track.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        rows.iter().map(subject_from_row).collect()
    }

    async fn upsert_topic(&self, topic: &Topic) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO topics (id, subject_id, name, description)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                subject_id = excluded.subject_id,
                name = excluded.name,
                description = excluded.description
            ",
        )
        .bind(id_to_i64("topic_id", topic.id.value())?)
        .bind(id_to_i64("subject_id", topic.subject_id.value())?)
        .bind(&topic.name)
        .bind(topic.description.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            other => conn(other),
        })?;
        Ok(())
    }

    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError> {
        let row = sqlx::query("SELECT id, subject_id, name, description FROM topics WHERE id = ?1")
            .bind(id_to_i64("topic_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        row.as_ref().map(topic_from_row).transpose()
    }

    async fn topics_for_subjects(&self, subjects: &[SubjectId]) -> Result<Vec<Topic>, StorageError> {
        if subjects.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, subject_id, name, description FROM topics WHERE subject_id IN (");
        let mut separated = qb.separated(", ");
        for subject in subjects {
            separated.push_bind(id_to_i64("subject_id", subject.value())?);
        }
        separated.push_unseparated(") ORDER BY id ASC");

        let rows = qb.build().fetch_all(&self.pool).await.map_err(conn)?;
        rows.iter().map(topic_from_row).collect()
    }
}
