//! Storage abstraction shared by the in-memory and Firestore backends.

use async_trait::async_trait;
use avanim_models::{
    Animation, AnimationId, AnimationStatus, Avatar, AvatarId, Expression, Role,
    SubscriptionStatus, User, UserId,
};

use crate::error::StoreResult;

/// Fields a user may change on their own profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub fullname: String,
    pub email: String,
}

/// Record persistence.
///
/// Listing methods return users, avatars and animations newest first and
/// expressions ordered by name.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;

    /// Cheap round trip used by readiness probes.
    async fn health_check(&self) -> StoreResult<()>;

    // Users

    /// Insert a new user. Fails with `AlreadyExists` if the email is taken.
    async fn create_user(&self, user: &User) -> StoreResult<()>;

    async fn get_user(&self, user_id: &UserId) -> StoreResult<Option<User>>;

    /// Look up by email, case-insensitively.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn list_users(&self) -> StoreResult<Vec<User>>;

    /// Change name and email. Fails with `AlreadyExists` if the new email
    /// belongs to someone else.
    async fn update_profile(&self, user_id: &UserId, update: &ProfileUpdate)
        -> StoreResult<User>;

    /// Change subscription status and, optionally, role.
    async fn set_subscription(
        &self,
        user_id: &UserId,
        role: Option<Role>,
        status: SubscriptionStatus,
    ) -> StoreResult<User>;

    /// Delete the user record only. Missing users are not an error.
    async fn delete_user(&self, user_id: &UserId) -> StoreResult<()>;

    // Avatars

    async fn create_avatar(&self, avatar: &Avatar) -> StoreResult<()>;

    async fn get_avatar(&self, avatar_id: &AvatarId) -> StoreResult<Option<Avatar>>;

    /// Avatars of `owner`, or every avatar when `owner` is `None`.
    async fn list_avatars(&self, owner: Option<&UserId>) -> StoreResult<Vec<Avatar>>;

    async fn delete_avatar(&self, avatar_id: &AvatarId) -> StoreResult<()>;

    // Expressions

    async fn upsert_expression(&self, expression: &Expression) -> StoreResult<()>;

    async fn get_expression(&self, expression_id: &str) -> StoreResult<Option<Expression>>;

    async fn list_expressions(&self) -> StoreResult<Vec<Expression>>;

    // Animations

    async fn create_animation(&self, animation: &Animation) -> StoreResult<()>;

    async fn get_animation(&self, animation_id: &AnimationId) -> StoreResult<Option<Animation>>;

    async fn list_animations(&self, user_id: &UserId) -> StoreResult<Vec<Animation>>;

    /// Move an animation to `status`, stamping `completed_at` for terminal states.
    async fn update_animation_status(
        &self,
        animation_id: &AnimationId,
        status: AnimationStatus,
        error_message: Option<String>,
    ) -> StoreResult<Animation>;

    async fn delete_animation(&self, animation_id: &AnimationId) -> StoreResult<()>;
}
