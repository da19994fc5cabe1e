use std::collections::HashSet;

use prep_core::model::{Achievement, AchievementId, UnlockedAchievement, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    achievement_id_from_i64, conn, id_to_i64, map_achievement_row, map_unlock_row, ser,
};
use crate::repository::{AchievementRepository, NewAchievementRecord, StorageError};

#[async_trait::async_trait]
impl AchievementRepository for SqliteRepository {
    async fn insert_achievement(
        &self,
        achievement: NewAchievementRecord,
    ) -> Result<AchievementId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO achievements (name, description, condition_type, condition_value)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(achievement.name)
        .bind(achievement.description)
        .bind(achievement.condition.as_str())
        .bind(i64::from(achievement.threshold))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        achievement_id_from_i64(res.last_insert_rowid())
    }

    async fn list_achievements(&self) -> Result<Vec<Achievement>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, name, description, condition_type, condition_value
            FROM achievements
            ORDER BY condition_value ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        rows.iter().map(map_achievement_row).collect()
    }

    async fn unlocked_ids(&self, user: UserId) -> Result<HashSet<AchievementId>, StorageError> {
        let rows = sqlx::query("SELECT achievement_id FROM user_achievements WHERE user_id = ?1")
            .bind(user.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter()
            .map(|row| achievement_id_from_i64(row.try_get("achievement_id").map_err(ser)?))
            .collect()
    }

    async fn record_unlock(&self, unlock: &UnlockedAchievement) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO user_achievements (user_id, achievement_id, unlocked_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id, achievement_id) DO NOTHING
            ",
        )
        .bind(unlock.user_id.as_uuid())
        .bind(id_to_i64("achievement_id", unlock.achievement_id.value())?)
        .bind(unlock.unlocked_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            other => conn(other),
        })?;
        Ok(res.rows_affected() == 1)
    }

    async fn unlocks_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<UnlockedAchievement>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, achievement_id, unlocked_at
            FROM user_achievements
            WHERE user_id = ?1
            ORDER BY unlocked_at ASC, achievement_id ASC
            ",
        )
        .bind(user.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        rows.iter().map(map_unlock_row).collect()
    }
}
