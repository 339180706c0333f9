//! In-process store for development and tests.

use async_trait::async_trait;
use avanim_models::user::normalize_email;
use avanim_models::{
    Animation, AnimationId, AnimationStatus, Avatar, AvatarId, Expression, Role,
    SubscriptionStatus, User, UserId,
};
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::store::{ProfileUpdate, Store};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    avatars: HashMap<AvatarId, Avatar>,
    expressions: HashMap<String, Expression>,
    animations: HashMap<AnimationId, Animation>,
}

/// [`Store`] backed by maps behind a tokio `RwLock`. Data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, F>(mut items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> chrono::DateTime<Utc>,
{
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
    items
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let email = normalize_email(&user.email);
        if tables.users.values().any(|u| u.email == email) {
            return Err(StoreError::already_exists(format!("user with email {email}")));
        }
        if tables.users.contains_key(&user.user_id) {
            return Err(StoreError::already_exists(format!("users/{}", user.user_id)));
        }
        let mut user = user.clone();
        user.email = email;
        tables.users.insert(user.user_id.clone(), user);
        Ok(())
    }

    async fn get_user(&self, user_id: &UserId) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = normalize_email(email);
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let users = self.tables.read().await.users.values().cloned().collect();
        Ok(newest_first(users, |u: &User| u.created_at))
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        update: &ProfileUpdate,
    ) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let email = normalize_email(&update.email);
        if tables
            .users
            .values()
            .any(|u| u.email == email && &u.user_id != user_id)
        {
            return Err(StoreError::already_exists(format!("user with email {email}")));
        }

        let user = tables
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::not_found(format!("users/{user_id}")))?;
        user.fullname = update.fullname.clone();
        user.email = email;
        Ok(user.clone())
    }

    async fn set_subscription(
        &self,
        user_id: &UserId,
        role: Option<Role>,
        status: SubscriptionStatus,
    ) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::not_found(format!("users/{user_id}")))?;
        if let Some(role) = role {
            user.role = role;
        }
        user.subscription_status = status;
        Ok(user.clone())
    }

    async fn delete_user(&self, user_id: &UserId) -> StoreResult<()> {
        self.tables.write().await.users.remove(user_id);
        Ok(())
    }

    async fn create_avatar(&self, avatar: &Avatar) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.avatars.contains_key(&avatar.avatar_id) {
            return Err(StoreError::already_exists(format!(
                "avatars/{}",
                avatar.avatar_id
            )));
        }
        tables
            .avatars
            .insert(avatar.avatar_id.clone(), avatar.clone());
        Ok(())
    }

    async fn get_avatar(&self, avatar_id: &AvatarId) -> StoreResult<Option<Avatar>> {
        Ok(self.tables.read().await.avatars.get(avatar_id).cloned())
    }

    async fn list_avatars(&self, owner: Option<&UserId>) -> StoreResult<Vec<Avatar>> {
        let avatars = self
            .tables
            .read()
            .await
            .avatars
            .values()
            .filter(|a| owner.map_or(true, |o| &a.user_id == o))
            .cloned()
            .collect();
        Ok(newest_first(avatars, |a: &Avatar| a.created_at))
    }

    async fn delete_avatar(&self, avatar_id: &AvatarId) -> StoreResult<()> {
        self.tables.write().await.avatars.remove(avatar_id);
        Ok(())
    }

    async fn upsert_expression(&self, expression: &Expression) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .expressions
            .insert(expression.expression_id.clone(), expression.clone());
        Ok(())
    }

    async fn get_expression(&self, expression_id: &str) -> StoreResult<Option<Expression>> {
        Ok(self
            .tables
            .read()
            .await
            .expressions
            .get(expression_id)
            .cloned())
    }

    async fn list_expressions(&self) -> StoreResult<Vec<Expression>> {
        let mut expressions: Vec<Expression> = self
            .tables
            .read()
            .await
            .expressions
            .values()
            .cloned()
            .collect();
        expressions.sort_by(|a, b| a.expression_name.cmp(&b.expression_name));
        Ok(expressions)
    }

    async fn create_animation(&self, animation: &Animation) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.animations.contains_key(&animation.animation_id) {
            return Err(StoreError::already_exists(format!(
                "animations/{}",
                animation.animation_id
            )));
        }
        tables
            .animations
            .insert(animation.animation_id.clone(), animation.clone());
        Ok(())
    }

    async fn get_animation(&self, animation_id: &AnimationId) -> StoreResult<Option<Animation>> {
        Ok(self
            .tables
            .read()
            .await
            .animations
            .get(animation_id)
            .cloned())
    }

    async fn list_animations(&self, user_id: &UserId) -> StoreResult<Vec<Animation>> {
        let animations = self
            .tables
            .read()
            .await
            .animations
            .values()
            .filter(|a| &a.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(animations, |a: &Animation| a.created_at))
    }

    async fn update_animation_status(
        &self,
        animation_id: &AnimationId,
        status: AnimationStatus,
        error_message: Option<String>,
    ) -> StoreResult<Animation> {
        let mut tables = self.tables.write().await;
        let animation = tables
            .animations
            .get_mut(animation_id)
            .ok_or_else(|| StoreError::not_found(format!("animations/{animation_id}")))?;
        animation.status = status;
        animation.error_message = error_message;
        animation.completed_at = status.is_terminal().then(Utc::now);
        Ok(animation.clone())
    }

    async fn delete_animation(&self, animation_id: &AnimationId) -> StoreResult<()> {
        self.tables.write().await.animations.remove(animation_id);
        Ok(())
    }
}
