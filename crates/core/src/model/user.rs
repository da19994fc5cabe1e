use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::UserId;

/// What the auth provider tells us after a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthIdentity {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Profile row kept alongside the auth account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub username: Option<String>,
    pub is_admin: bool,
}

/// The signed-in user as the rest of the application sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub avatar: Option<String>,
    pub is_admin: bool,
}

impl AuthUser {
    /// Username resolution order: profile, provider display name, email local part.
    #[must_use]
    pub fn from_identity(identity: AuthIdentity, profile: Option<&UserProfile>) -> Self {
        let username = profile
            .and_then(|p| p.username.clone())
            .or_else(|| identity.display_name.clone())
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| {
                identity
                    .email
                    .split('@')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            });

        Self {
            id: identity.id,
            email: identity.email,
            username,
            avatar: identity.avatar_url,
            is_admin: profile.is_some_and(|p| p.is_admin),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One line of tutor chat history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub user_id: UserId,
    pub role: ChatRole,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// One row of the public leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: UserId,
    pub username: String,
    pub total_correct: u32,
    pub total_attempted: u32,
}
