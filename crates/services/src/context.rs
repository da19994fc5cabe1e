//! The logged-in user, shared by every service.

use std::sync::Arc;

use prep_core::model::{AuthIdentity, AuthUser, UserProfile};
use storage::repository::ProfileRepository;
use tokio::sync::watch;
use tracing::info;

use crate::error::AuthError;

/// Injectable auth state.
///
/// Cloning shares the same underlying state; watchers observe login and
/// logout through [`SessionContext::subscribe`].
#[derive(Clone)]
pub struct SessionContext {
    profiles: Arc<dyn ProfileRepository>,
    current: Arc<watch::Sender<Option<AuthUser>>>,
}

impl SessionContext {
    #[must_use]
    pub fn new(profiles: Arc<dyn ProfileRepository>) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            profiles,
            current: Arc::new(tx),
        }
    }

    /// Map an authenticated identity to the session user.
    ///
    /// A profile row is created on first login so the user shows up by name
    /// on the leaderboard.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the profile cannot be read or created.
    pub async fn login(&self, identity: AuthIdentity) -> Result<AuthUser, AuthError> {
        let profile = match self.profiles.get_profile(identity.id).await? {
            Some(profile) => profile,
            None => {
                let fresh = AuthUser::from_identity(identity.clone(), None);
                let profile = UserProfile {
                    id: identity.id,
                    username: Some(fresh.username),
                    is_admin: false,
                };
                self.profiles.upsert_profile(&profile).await?;
                profile
            }
        };

        let user = AuthUser::from_identity(identity, Some(&profile));
        info!(user_id = %user.id, username = %user.username, admin = user.is_admin, "logged in");
        self.current.send_replace(Some(user.clone()));
        Ok(user)
    }

    /// Clear the session, returning whoever was logged in.
    pub fn logout(&self) -> Option<AuthUser> {
        let previous = self.current.send_replace(None);
        if let Some(user) = &previous {
            info!(user_id = %user.id, "logged out");
        }
        previous
    }

    #[must_use]
    pub fn current(&self) -> Option<AuthUser> {
        self.current.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthUser>> {
        self.current.subscribe()
    }

    /// # Errors
    ///
    /// Returns `AuthError::Unauthenticated` when nobody is logged in.
    pub fn require_user(&self) -> Result<AuthUser, AuthError> {
        self.current().ok_or(AuthError::Unauthenticated)
    }

    /// # Errors
    ///
    /// Returns `AuthError::Unauthenticated` when nobody is logged in and
    /// `AuthError::Forbidden` for non-admin users.
    pub fn require_admin(&self) -> Result<AuthUser, AuthError> {
        let user = self.require_user()?;
        if user.is_admin {
            Ok(user)
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use prep_core::model::UserId;
    use storage::InMemoryRepository;

    use super::*;

    fn identity(email: &str, display: Option<&str>) -> AuthIdentity {
        AuthIdentity {
            id: UserId::random(),
            email: email.into(),
            display_name: display.map(str::to_string),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn login_creates_profile_and_notifies_watchers() {
        let repo = Arc::new(InMemoryRepository::new());
        let ctx = SessionContext::new(repo.clone());
        let mut rx = ctx.subscribe();

        let user = ctx.login(identity("ada@example.com", None)).await.unwrap();
        assert_eq!(user.username, "ada");
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref().map(|u| u.id), Some(user.id));

        let stored = repo.get_profile(user.id).await.unwrap().unwrap();
        assert_eq!(stored.username.as_deref(), Some("ada"));

        assert_eq!(ctx.logout().map(|u| u.id), Some(user.id));
        assert!(matches!(ctx.require_user(), Err(AuthError::Unauthenticated)));
    }

    #[tokio::test]
    async fn stored_profile_wins_and_grants_admin() {
        let repo = Arc::new(InMemoryRepository::new());
        let who = identity("sam@example.com", Some("Sammy"));
        repo.upsert_profile(&UserProfile {
            id: who.id,
            username: Some("sam_admin".into()),
            is_admin: true,
        })
        .await
        .unwrap();

        let ctx = SessionContext::new(repo);
        let user = ctx.login(who).await.unwrap();
        assert_eq!(user.username, "sam_admin");
        assert!(ctx.require_admin().is_ok());
    }

    #[tokio::test]
    async fn non_admin_is_forbidden() {
        let ctx = SessionContext::new(Arc::new(InMemoryRepository::new()));
        ctx.login(identity("kid@example.com", Some("Kid"))).await.unwrap();
        assert!(matches!(ctx.require_admin(), Err(AuthError::Forbidden)));
    }
}
