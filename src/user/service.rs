//! Profile mutation flows.
//!
//! Every mutation writes through the credential store first, then repairs
//! the caller's session snapshot. The two steps are sequential within one
//! request and deliberately not atomic; a refresh that cannot land anymore
//! is a warning, the store write stands either way.

use crate::error::Result;
use crate::session::SessionManager;
use crate::user::{User, UserStore, UserUpdate};

/// Applies partial updates to a credential record and re-synchronizes the
/// session snapshot.
pub struct ProfileService<'a> {
    store: &'a UserStore,
    sessions: &'a SessionManager,
}

impl<'a> ProfileService<'a> {
    /// Create a new [`ProfileService`].
    pub fn new(store: &'a UserStore, sessions: &'a SessionManager) -> Self {
        Self { store, sessions }
    }

    /// Apply a partial update to `user_id` and refresh the caller's
    /// snapshot when it references that record.
    pub async fn update_profile(
        &self,
        session_id: &str,
        user_id: &str,
        fields: UserUpdate,
    ) -> Result<User> {
        let user = self.store.update(user_id, fields).await?;
        self.resync(session_id, &user).await;
        Ok(user)
    }

    /// Point `user_id` at an already-stored asset.
    ///
    /// The asset must have passed the upload policy beforehand. When the
    /// store write fails the file stays orphaned; the request fails, no
    /// cleanup is attempted.
    pub async fn update_picture(
        &self,
        session_id: &str,
        user_id: &str,
        asset: String,
    ) -> Result<User> {
        let fields = UserUpdate {
            profile_pic: Some(asset),
            ..Default::default()
        };
        self.update_profile(session_id, user_id, fields).await
    }

    /// Delete `user_id` from the store, then terminate the caller's
    /// session.
    pub async fn delete_profile(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<()> {
        self.store.delete(user_id).await?;
        self.sessions.terminate(session_id).await;
        Ok(())
    }

    async fn resync(&self, session_id: &str, user: &User) {
        match self.sessions.read(session_id).await {
            Some(snapshot) if snapshot.id == user.id => {
                if !self.sessions.refresh(session_id, user.clone()).await {
                    tracing::warn!(
                        user_id = user.id,
                        "session gone before snapshot refresh; store write stands"
                    );
                }
            },
            _ => {
                tracing::debug!(
                    user_id = user.id,
                    "caller session does not reference the updated record"
                );
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::ServerError;
    use crate::user::NewUser;

    async fn setup() -> (UserStore, SessionManager, User, String) {
        let store = UserStore::memory();
        let sessions = SessionManager::new(Duration::from_secs(60));

        let user = store
            .create(NewUser {
                first_name: "Ada".to_owned(),
                last_name: "Lovelace".to_owned(),
                email: "ada@example.org".to_owned(),
                password: "$argon2id$fake".to_owned(),
                phone: "9876543210".to_owned(),
            })
            .await
            .unwrap();
        let session_id = sessions.start(user.clone()).await;

        (store, sessions, user, session_id)
    }

    #[tokio::test]
    async fn test_update_refreshes_snapshot() {
        let (store, sessions, user, session_id) = setup().await;
        let service = ProfileService::new(&store, &sessions);

        service
            .update_profile(
                &session_id,
                &user.id,
                UserUpdate {
                    first_name: Some("Augusta".to_owned()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // No staleness survives an explicit refresh.
        let snapshot = sessions.read(&session_id).await.unwrap();
        assert_eq!(snapshot.first_name, "Augusta");
    }

    #[tokio::test]
    async fn test_update_with_dead_session_still_persists() {
        let (store, sessions, user, session_id) = setup().await;
        sessions.terminate(&session_id).await;

        let service = ProfileService::new(&store, &sessions);
        service
            .update_profile(
                &session_id,
                &user.id,
                UserUpdate {
                    phone: Some("0123456789".to_owned()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = store.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.phone, "0123456789");
    }

    #[tokio::test]
    async fn test_picture_update_touches_reference_only() {
        let (store, sessions, user, session_id) = setup().await;
        let service = ProfileService::new(&store, &sessions);

        let updated = service
            .update_picture(&session_id, &user.id, "abc123.png".to_owned())
            .await
            .unwrap();

        assert_eq!(updated.profile_pic, "abc123.png");
        assert_eq!(updated.email, user.email);
        assert_eq!(
            sessions.read(&session_id).await.unwrap().profile_pic,
            "abc123.png"
        );
    }

    #[tokio::test]
    async fn test_delete_terminates_session() {
        let (store, sessions, user, session_id) = setup().await;
        let service = ProfileService::new(&store, &sessions);

        service.delete_profile(&session_id, &user.id).await.unwrap();

        assert!(store.find_by_id(&user.id).await.unwrap().is_none());
        assert!(sessions.read(&session_id).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_user_keeps_session() {
        let (store, sessions, _, session_id) = setup().await;
        let service = ProfileService::new(&store, &sessions);

        let result = service.delete_profile(&session_id, "ghost").await;
        assert!(matches!(result, Err(ServerError::NotFound)));
        assert!(sessions.read(&session_id).await.is_some());
    }
}
