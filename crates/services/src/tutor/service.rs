use std::sync::Arc;

use prep_core::Clock;
use prep_core::model::{ChatMessage, ChatRole, UserId};
use storage::repository::ChatHistoryRepository;
use tracing::info;

use super::ChatGateway;
use crate::context::SessionContext;
use crate::error::TutorError;

/// Messages shown when the chat opens.
pub const HISTORY_LIMIT: u32 = 50;

/// Tutor chat for the logged-in user, with history kept in storage.
#[derive(Clone)]
pub struct TutorService {
    clock: Clock,
    context: SessionContext,
    chat: Arc<dyn ChatHistoryRepository>,
    gateway: Arc<dyn ChatGateway>,
}

impl TutorService {
    #[must_use]
    pub fn new(
        clock: Clock,
        context: SessionContext,
        chat: Arc<dyn ChatHistoryRepository>,
        gateway: Arc<dyn ChatGateway>,
    ) -> Self {
        Self {
            clock,
            context,
            chat,
            gateway,
        }
    }

    /// Send a message and return the tutor's stored reply.
    ///
    /// The user's message is saved before the gateway is called, so it stays
    /// in history even when the call fails.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::EmptyMessage` for blank input, `Auth` without a
    /// logged-in user, gateway errors, or `Storage`.
    pub async fn send(&self, message: &str) -> Result<ChatMessage, TutorError> {
        let user = self.context.require_user()?;
        let message = message.trim();
        if message.is_empty() {
            return Err(TutorError::EmptyMessage);
        }

        self.chat
            .append_message(&self.entry(user.id, ChatRole::User, message.to_string()))
            .await?;

        let reply = self.gateway.ask(message).await?;
        let reply = self.entry(user.id, ChatRole::Assistant, reply);
        self.chat.append_message(&reply).await?;
        info!(user_id = %user.id, chars = reply.message.chars().count(), "tutor replied");
        Ok(reply)
    }

    /// Latest messages, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::Auth` without a user or `Storage` on read failure.
    pub async fn history(&self) -> Result<Vec<ChatMessage>, TutorError> {
        let user = self.context.require_user()?;
        Ok(self.chat.recent_messages(user.id, HISTORY_LIMIT).await?)
    }

    /// Delete the user's whole conversation, returning how many messages went.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::Auth` without a user or `Storage` on failure.
    pub async fn clear_history(&self) -> Result<u64, TutorError> {
        let user = self.context.require_user()?;
        let removed = self.chat.clear_messages(user.id).await?;
        info!(user_id = %user.id, removed, "tutor history cleared");
        Ok(removed)
    }

    fn entry(&self, user_id: UserId, role: ChatRole, message: String) -> ChatMessage {
        ChatMessage {
            user_id,
            role,
            message,
            created_at: self.clock.now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use prep_core::model::AuthIdentity;
    use prep_core::time::fixed_clock;
    use storage::InMemoryRepository;

    use super::*;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl ChatGateway for Recording {
        async fn ask(&self, message: &str) -> Result<String, TutorError> {
            self.seen.lock().unwrap().push(message.to_string());
            if self.fail {
                return Err(TutorError::Upstream {
                    status: 503,
                    message: "AI service error".into(),
                });
            }
            Ok(format!("answer to {message}"))
        }
    }

    async fn service(gateway: Arc<Recording>) -> TutorService {
        let repo = Arc::new(InMemoryRepository::new());
        let context = SessionContext::new(repo.clone());
        context
            .login(AuthIdentity {
                id: UserId::random(),
                email: "ada@example.com".into(),
                display_name: None,
                avatar_url: None,
            })
            .await
            .unwrap();
        TutorService::new(fixed_clock(), context, repo, gateway)
    }

    #[tokio::test]
    async fn send_stores_both_sides_and_only_forwards_latest() {
        let gateway = Arc::new(Recording::default());
        let tutor = service(gateway.clone()).await;

        tutor.send("What is a noun?").await.unwrap();
        let reply = tutor.send("  And a verb?  ").await.unwrap();
        assert_eq!(reply.role, ChatRole::Assistant);
        assert_eq!(reply.message, "answer to And a verb?");

        let history = tutor.history().await.unwrap();
        let roles: Vec<_> = history.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![ChatRole::User, ChatRole::Assistant, ChatRole::User, ChatRole::Assistant]
        );
        assert_eq!(
            *gateway.seen.lock().unwrap(),
            vec!["What is a noun?".to_string(), "And a verb?".to_string()]
        );

        assert_eq!(tutor.clear_history().await.unwrap(), 4);
        assert!(tutor.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_call_keeps_the_question() {
        let gateway = Arc::new(Recording {
            fail: true,
            ..Recording::default()
        });
        let tutor = service(gateway).await;

        assert!(matches!(
            tutor.send("help").await,
            Err(TutorError::Upstream { status: 503, .. })
        ));
        let history = tutor.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, ChatRole::User);
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let tutor = service(Arc::new(Recording::default())).await;
        assert!(matches!(tutor.send("  ").await, Err(TutorError::EmptyMessage)));
    }
}
