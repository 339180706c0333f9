//! Account lifecycle: signup, login, subscriptions and admin moderation.

use std::sync::Arc;

use tracing::{info, warn};

use avanim_models::{Role, SubscriptionStatus, User, UserId};
use avanim_store::{ProfileUpdate, Store, StoreError};

use crate::auth::{hash_password, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::services::files::MediaFiles;

/// Moderation actions an admin can apply to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Suspend,
    Activate,
}

impl AdminAction {
    pub fn parse(action: &str) -> ApiResult<Self> {
        match action.trim().to_lowercase().as_str() {
            "suspend" => Ok(AdminAction::Suspend),
            "activate" => Ok(AdminAction::Activate),
            _ => Err(ApiError::bad_request("Invalid action")),
        }
    }

    fn status(self) -> SubscriptionStatus {
        match self {
            AdminAction::Suspend => SubscriptionStatus::Suspended,
            AdminAction::Activate => SubscriptionStatus::Active,
        }
    }
}

/// User service.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    files: MediaFiles,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, files: MediaFiles) -> Self {
        Self { store, files }
    }

    /// Register a new account with the `user` role.
    pub async fn signup(&self, fullname: &str, email: &str, password: &str) -> ApiResult<User> {
        if self.store.find_user_by_email(email).await?.is_some() {
            return Err(ApiError::bad_request("Email already exists"));
        }

        let user = User::new(fullname, email, hash_password(password)?);
        match self.store.create_user(&user).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists(_)) => {
                return Err(ApiError::bad_request("Email already exists"))
            }
            Err(e) => return Err(e.into()),
        }

        info!(user_id = %user.user_id, "Created account");
        Ok(user)
    }

    /// Check credentials. Unknown emails and wrong passwords are indistinguishable.
    pub async fn authenticate(&self, email: &str, password: &str) -> ApiResult<User> {
        let user = self
            .store
            .find_user_by_email(email)
            .await?
            .filter(|user| verify_password(password, &user.password_hash))
            .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

        info!(user_id = %user.user_id, role = %user.role, "User logged in");
        Ok(user)
    }

    /// Make sure an admin account exists for `email`, promoting an existing
    /// account if needed.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> ApiResult<User> {
        if let Some(existing) = self.store.find_user_by_email(email).await? {
            if existing.is_admin() {
                return Ok(existing);
            }
            let promoted = self
                .store
                .set_subscription(
                    &existing.user_id,
                    Some(Role::Admin),
                    existing.subscription_status,
                )
                .await?;
            warn!(user_id = %promoted.user_id, "Promoted existing account to admin");
            return Ok(promoted);
        }

        let admin = User::new("Administrator", email, hash_password(password)?)
            .with_role(Role::Admin);
        self.store.create_user(&admin).await?;
        info!(user_id = %admin.user_id, "Created admin account");
        Ok(admin)
    }

    pub async fn update_profile(&self, user_id: &UserId, fullname: &str, email: &str) -> ApiResult<User> {
        let update = ProfileUpdate {
            fullname: fullname.to_string(),
            email: email.to_string(),
        };
        match self.store.update_profile(user_id, &update).await {
            Ok(user) => Ok(user),
            Err(StoreError::AlreadyExists(_)) => Err(ApiError::bad_request("Email already exists")),
            Err(e) => Err(e.into()),
        }
    }

    /// Upgrade to the subscriber role with an active subscription.
    pub async fn subscribe(&self, user: &User) -> ApiResult<User> {
        // admins keep their role
        let role = (!user.is_admin()).then_some(Role::Subscriber);
        let updated = self
            .store
            .set_subscription(&user.user_id, role, SubscriptionStatus::Active)
            .await?;
        info!(user_id = %updated.user_id, "Subscription activated");
        Ok(updated)
    }

    pub async fn list_users(&self) -> ApiResult<Vec<User>> {
        Ok(self.store.list_users().await?)
    }

    /// Apply a moderation action to another account.
    pub async fn moderate(&self, admin: &User, user_id: &UserId, action: AdminAction) -> ApiResult<User> {
        if &admin.user_id == user_id {
            return Err(ApiError::bad_request("Admins cannot change their own status"));
        }
        self.require_user(user_id).await?;

        let updated = self
            .store
            .set_subscription(user_id, None, action.status())
            .await?;
        info!(
            admin_id = %admin.user_id,
            user_id = %user_id,
            status = %updated.subscription_status,
            "Updated account status"
        );
        Ok(updated)
    }

    /// Delete an account together with its avatars, animations and files.
    pub async fn delete_user(&self, admin: &User, user_id: &UserId) -> ApiResult<()> {
        if &admin.user_id == user_id {
            return Err(ApiError::bad_request("Admins cannot delete their own account"));
        }
        self.require_user(user_id).await?;

        let animations = self.store.list_animations(user_id).await?;
        for animation in &animations {
            self.files.remove(&animation.animation_path).await;
            if let Some(driving) = &animation.driving_path {
                self.files.remove(driving).await;
            }
            self.store.delete_animation(&animation.animation_id).await?;
        }

        let avatars = self.store.list_avatars(Some(user_id)).await?;
        for avatar in &avatars {
            self.files.remove(&avatar.avatar_path).await;
            self.store.delete_avatar(&avatar.avatar_id).await?;
        }

        self.store.delete_user(user_id).await?;
        info!(
            admin_id = %admin.user_id,
            user_id = %user_id,
            avatars = avatars.len(),
            animations = animations.len(),
            "Deleted account"
        );
        Ok(())
    }

    async fn require_user(&self, user_id: &UserId) -> ApiResult<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }
}
