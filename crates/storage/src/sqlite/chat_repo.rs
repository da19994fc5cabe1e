use prep_core::model::{ChatMessage, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_chat_row};
use crate::repository::{ChatHistoryRepository, StorageError};

#[async_trait::async_trait]
impl ChatHistoryRepository for SqliteRepository {
    async fn append_message(&self, message: &ChatMessage) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO chat_history (user_id, role, message, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(message.user_id.as_uuid())
        .bind(message.role.as_str())
        .bind(&message.message)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn recent_messages(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, role, message, created_at FROM (
                SELECT id, user_id, role, message, created_at
                FROM chat_history
                WHERE user_id = ?1
                ORDER BY created_at DESC, id DESC
                LIMIT ?2
            )
            ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(user.as_uuid())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        rows.iter().map(map_chat_row).collect()
    }

    async fn clear_messages(&self, user: UserId) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM chat_history WHERE user_id = ?1")
            .bind(user.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(res.rows_affected())
    }
}
