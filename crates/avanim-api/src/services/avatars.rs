//! Avatar uploads and ownership.

use std::sync::Arc;

use tracing::info;

use avanim_models::{Avatar, AvatarId, User};
use avanim_store::Store;

use crate::error::{ApiError, ApiResult};
use crate::security::{allowed_extension, unique_upload_name, IMAGE_EXTENSIONS};
use crate::services::files::{MediaFiles, AVATARS_DIR};

#[derive(Clone)]
pub struct AvatarService {
    store: Arc<dyn Store>,
    files: MediaFiles,
}

impl AvatarService {
    pub fn new(store: Arc<dyn Store>, files: MediaFiles) -> Self {
        Self { store, files }
    }

    /// Store an uploaded portrait and record it for `owner`.
    pub async fn upload(&self, owner: &User, filename: &str, data: &[u8]) -> ApiResult<Avatar> {
        if data.is_empty() {
            return Err(ApiError::bad_request("No file selected"));
        }
        allowed_extension(filename, IMAGE_EXTENSIONS)
            .ok_or_else(|| ApiError::bad_request("Invalid file type"))?;
        let name = unique_upload_name(filename)
            .ok_or_else(|| ApiError::bad_request("Invalid file name"))?;

        let relative = self.files.save(AVATARS_DIR, &name, data).await?;
        let avatar = Avatar::new(owner.user_id.clone(), relative);
        if let Err(e) = self.store.create_avatar(&avatar).await {
            self.files.remove(&avatar.avatar_path).await;
            return Err(e.into());
        }

        info!(
            user_id = %owner.user_id,
            avatar_id = %avatar.avatar_id,
            bytes = data.len(),
            "Avatar uploaded"
        );
        Ok(avatar)
    }

    /// The caller's avatars, or every avatar for admins.
    pub async fn list(&self, user: &User) -> ApiResult<Vec<Avatar>> {
        let owner = (!user.is_admin()).then_some(&user.user_id);
        Ok(self.store.list_avatars(owner).await?)
    }

    /// An avatar the caller may use. Other users' avatars read as missing.
    pub async fn get_accessible(&self, user: &User, avatar_id: &AvatarId) -> ApiResult<Avatar> {
        self.store
            .get_avatar(avatar_id)
            .await?
            .filter(|avatar| user.is_admin() || avatar.is_owned_by(&user.user_id))
            .ok_or_else(|| ApiError::not_found("Avatar not found"))
    }

    /// Delete an avatar, its file and the animations made from it.
    pub async fn delete(&self, user: &User, avatar_id: &AvatarId) -> ApiResult<()> {
        let avatar = self.get_accessible(user, avatar_id).await?;

        let animations = self.store.list_animations(&avatar.user_id).await?;
        let mut removed = 0usize;
        for animation in animations.iter().filter(|a| a.avatar_id == avatar.avatar_id) {
            self.files.remove(&animation.animation_path).await;
            if let Some(driving) = &animation.driving_path {
                self.files.remove(driving).await;
            }
            self.store.delete_animation(&animation.animation_id).await?;
            removed += 1;
        }

        self.files.remove(&avatar.avatar_path).await;
        self.store.delete_avatar(&avatar.avatar_id).await?;

        info!(
            user_id = %user.user_id,
            avatar_id = %avatar.avatar_id,
            animations = removed,
            "Avatar deleted"
        );
        Ok(())
    }
}
