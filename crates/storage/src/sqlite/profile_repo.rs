use prep_core::model::{LeaderboardEntry, TrackSelection, UserId, UserProfile};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    conn, exam_type_id_from_i64, i64_to_u32, id_to_i64, ser, track_id_from_i64,
    user_id_from_row,
};
use crate::repository::{ANONYMOUS_USERNAME, ProfileRepository, StorageError};

#[async_trait::async_trait]
impl ProfileRepository for SqliteRepository {
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO user_profiles (id, username, is_admin)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                username = excluded.username,
                is_admin = excluded.is_admin
            ",
        )
        .bind(profile.id.as_uuid())
        .bind(profile.username.as_deref())
        .bind(i64::from(profile.is_admin))
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn get_profile(&self, user: UserId) -> Result<Option<UserProfile>, StorageError> {
        let row = sqlx::query("SELECT id, username, is_admin FROM user_profiles WHERE id = ?1")
            .bind(user.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(UserProfile {
            id: user_id_from_row(&row, "id")?,
            username: row.try_get("username").map_err(ser)?,
            is_admin: row.try_get::<i64, _>("is_admin").map_err(ser)? != 0,
        }))
    }

    async fn set_track_selection(&self, selection: &TrackSelection) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO user_track_selection (user_id, track_id, exam_type_id)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id) DO UPDATE SET
                track_id = excluded.track_id,
                exam_type_id = excluded.exam_type_id
            ",
        )
        .bind(selection.user_id.as_uuid())
        .bind(id_to_i64("track_id", selection.track_id.value())?)
        .bind(id_to_i64("exam_type_id", selection.exam_type_id.value())?)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            other => conn(other),
        })?;
        Ok(())
    }

    async fn get_track_selection(
        &self,
        user: UserId,
    ) -> Result<Option<TrackSelection>, StorageError> {
        let row = sqlx::query(
            "SELECT user_id, track_id, exam_type_id FROM user_track_selection WHERE user_id = ?1",
        )
        .bind(user.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(TrackSelection {
            user_id: user_id_from_row(&row, "user_id")?,
            track_id: track_id_from_i64(row.try_get("track_id").map_err(ser)?)?,
            exam_type_id: exam_type_id_from_i64(row.try_get("exam_type_id").map_err(ser)?)?,
        }))
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT p.user_id AS user_id,
                   pr.username AS username,
                   SUM(p.questions_correct) AS total_correct,
                   SUM(p.questions_attempted) AS total_attempted
            FROM user_progress p
            LEFT JOIN user_profiles pr ON pr.id = p.user_id
            GROUP BY p.user_id
            ORDER BY total_correct DESC, total_attempted ASC, p.user_id ASC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut entries = Vec::with_capacity(rows.len());
        for (row, rank) in rows.iter().zip(1_u32..) {
            let username: Option<String> = row.try_get("username").map_err(ser)?;
            entries.push(LeaderboardEntry {
                rank,
                user_id: user_id_from_row(row, "user_id")?,
                username: username.unwrap_or_else(|| ANONYMOUS_USERNAME.to_string()),
                total_correct: i64_to_u32("total_correct", row.try_get("total_correct").map_err(ser)?)?,
                total_attempted: i64_to_u32(
                    "total_attempted",
                    row.try_get("total_attempted").map_err(ser)?,
                )?,
            });
        }
        Ok(entries)
    }
}
