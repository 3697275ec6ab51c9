use game_core::validate_glyph;
use game_types::{GameError, User};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::codec::{decode_user, encode_user};
use crate::store::{DocumentStore, join_path};

pub const USERS_ROOT: &str = "users";

/// Profiles stored at `users/{id}`.
#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn DocumentStore>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn user_path(id: &str) -> String {
        join_path(USERS_ROOT, id)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, GameError> {
        match self.store.get(&Self::user_path(id)).await? {
            Some(tree) => Ok(Some(decode_user(&tree)?)),
            None => Ok(None),
        }
    }

    pub async fn create_user(&self, user: User) -> Result<User, GameError> {
        self.store
            .set(&Self::user_path(&user.id), encode_user(&user)?)
            .await?;
        info!("Created profile for user {}", user.id);
        Ok(user)
    }

    /// Returns the stored profile, creating one with the default avatar on
    /// first sign-in.
    pub async fn get_or_create(
        &self,
        id: &str,
        display_name: &str,
        email: Option<String>,
    ) -> Result<User, GameError> {
        if let Some(user) = self.find_by_id(id).await? {
            return Ok(user);
        }
        self.create_user(User::new(id, display_name, email)).await
    }

    pub async fn update_avatar(&self, id: &str, avatar: &str) -> Result<User, GameError> {
        validate_glyph(avatar)?;
        let mut user = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| GameError::invalid_input(format!("unknown user {id}")))?;

        let avatar = avatar.trim().to_string();
        self.store
            .set(
                &join_path(&Self::user_path(id), "avatar"),
                Value::String(avatar.clone()),
            )
            .await?;
        user.avatar = avatar;
        Ok(user)
    }
}
