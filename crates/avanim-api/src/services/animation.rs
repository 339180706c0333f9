//! Animation requests: record keeping around the motion-transfer wrapper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, warn};

use avanim_media::{AnimationTask, Animator, AnimatorHandle, DrivingSource, TaskOutcome};
use avanim_models::{Animation, AnimationId, AnimationStatus, Avatar, AvatarId, User};
use avanim_store::Store;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::{allowed_extension, unique_upload_name, VIDEO_EXTENSIONS};
use crate::services::avatars::AvatarService;
use crate::services::files::{MediaFiles, DRIVING_DIR};

/// An animation joined with its avatar and expression for listings.
#[derive(Debug, Clone, Serialize)]
pub struct AnimationView {
    #[serde(flatten)]
    pub animation: Animation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression_name: Option<String>,
}

/// Outcome of one generation request.
#[derive(Debug, Clone)]
pub struct Generated {
    pub animation: Animation,
    pub outcome: TaskOutcome,
}

#[derive(Clone)]
pub struct AnimationService {
    store: Arc<dyn Store>,
    files: MediaFiles,
    avatars: AvatarService,
    animator: AnimatorHandle,
}

impl AnimationService {
    pub fn new(
        store: Arc<dyn Store>,
        files: MediaFiles,
        avatars: AvatarService,
        animator: AnimatorHandle,
    ) -> Self {
        Self {
            store,
            files,
            avatars,
            animator,
        }
    }

    /// Animate an avatar with a catalog expression.
    pub async fn generate_expression(
        &self,
        user: &User,
        avatar_id: &AvatarId,
        expression_id: &str,
    ) -> ApiResult<Generated> {
        let avatar = self.avatars.get_accessible(user, avatar_id).await?;
        let expression = self
            .store
            .get_expression(expression_id)
            .await?
            .ok_or_else(|| ApiError::bad_request("Invalid expression"))?;
        let animator = self.require_ready("expression")?;

        // store records can outlive their catalog entry
        if animator.catalog().lookup(&expression.expression_name).is_err() {
            warn!(
                expression = %expression.expression_name,
                "Expression record has no catalog entry"
            );
            return Err(ApiError::bad_request("Invalid expression"));
        }

        let animation = Animation::for_expression(
            user.user_id.clone(),
            avatar.avatar_id.clone(),
            expression.expression_id.clone(),
        );
        let source = DrivingSource::Expression(expression.expression_name);
        self.run("expression", &avatar, animation, source).await
    }

    /// Animate an avatar with an uploaded driving video.
    pub async fn generate_custom(
        &self,
        user: &User,
        avatar_id: &AvatarId,
        filename: &str,
        data: &[u8],
    ) -> ApiResult<Generated> {
        if data.is_empty() {
            return Err(ApiError::bad_request("Driving video is required"));
        }
        allowed_extension(filename, VIDEO_EXTENSIONS)
            .ok_or_else(|| ApiError::bad_request("Invalid video type"))?;
        let name = unique_upload_name(filename)
            .ok_or_else(|| ApiError::bad_request("Invalid file name"))?;

        let avatar = self.avatars.get_accessible(user, avatar_id).await?;
        self.require_ready("custom")?;

        let driving_path = self.files.save(DRIVING_DIR, &name, data).await?;
        metrics::record_upload("driving", data.len());

        let source = DrivingSource::Custom(self.files.absolute(&driving_path)?);
        let animation = Animation::for_driving_video(
            user.user_id.clone(),
            avatar.avatar_id.clone(),
            driving_path,
        );
        self.run("custom", &avatar, animation, source).await
    }

    /// Refuse before any record or file exists when no model is loaded.
    fn require_ready(&self, kind: &'static str) -> ApiResult<&Arc<Animator>> {
        self.animator.animator().map_err(|e| {
            metrics::record_animation_request(kind, "unavailable");
            ApiError::from(e)
        })
    }

    async fn run(
        &self,
        kind: &'static str,
        avatar: &Avatar,
        animation: Animation,
        source: DrivingSource,
    ) -> ApiResult<Generated> {
        let task = AnimationTask {
            avatar_path: self.files.absolute(&avatar.avatar_path)?,
            source,
            output_path: self.files.absolute(&animation.animation_path)?,
        };
        if let Some(parent) = task.output_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ApiError::internal(format!("Failed to create output dir: {}", e)))?;
        }

        self.store.create_animation(&animation).await?;
        info!(
            animation_id = %animation.animation_id,
            avatar_id = %avatar.avatar_id,
            kind,
            "Starting animation"
        );

        let start = Instant::now();
        let handle = self.animator.clone();
        let outcome = match tokio::task::spawn_blocking(move || handle.process_task(&task)).await {
            Ok(outcome) => outcome,
            Err(e) => TaskOutcome::Failed {
                error: format!("Animation task panicked: {}", e),
            },
        };

        let (status, error_message) = match &outcome {
            TaskOutcome::Success { .. } => (AnimationStatus::Completed, None),
            TaskOutcome::Failed { error } => (AnimationStatus::Failed, Some(error.clone())),
        };
        let animation = self
            .store
            .update_animation_status(&animation.animation_id, status, error_message)
            .await?;

        let elapsed = start.elapsed().as_secs_f64();
        match &outcome {
            TaskOutcome::Success { .. } => {
                metrics::record_animation_request(kind, "completed");
                info!(
                    animation_id = %animation.animation_id,
                    elapsed_secs = elapsed,
                    "Animation completed"
                );
            }
            TaskOutcome::Failed { error } => {
                metrics::record_animation_request(kind, "failed");
                error!(
                    animation_id = %animation.animation_id,
                    elapsed_secs = elapsed,
                    "Animation failed: {}",
                    error
                );
            }
        }

        Ok(Generated { animation, outcome })
    }

    /// The caller's animations, newest first.
    pub async fn list(&self, user: &User) -> ApiResult<Vec<AnimationView>> {
        let animations = self.store.list_animations(&user.user_id).await?;
        if animations.is_empty() {
            return Ok(Vec::new());
        }

        let avatar_paths: HashMap<AvatarId, String> = self
            .store
            .list_avatars(Some(&user.user_id))
            .await?
            .into_iter()
            .map(|a| (a.avatar_id, a.avatar_path))
            .collect();
        let expression_names: HashMap<String, String> = self
            .store
            .list_expressions()
            .await?
            .into_iter()
            .map(|e| (e.expression_id, e.expression_name))
            .collect();

        Ok(animations
            .into_iter()
            .map(|animation| AnimationView {
                avatar_path: avatar_paths.get(&animation.avatar_id).cloned(),
                expression_name: animation
                    .expression_id
                    .as_ref()
                    .and_then(|id| expression_names.get(id).cloned()),
                animation,
            })
            .collect())
    }

    /// Delete an animation the caller owns, with its files.
    pub async fn delete(&self, user: &User, animation_id: &AnimationId) -> ApiResult<()> {
        let animation = self
            .store
            .get_animation(animation_id)
            .await?
            .filter(|a| user.is_admin() || a.user_id == user.user_id)
            .ok_or_else(|| ApiError::not_found("Animation not found"))?;

        if animation.status == AnimationStatus::Processing {
            warn!(animation_id = %animation_id, "Deleting animation still marked processing");
        }

        self.files.remove(&animation.animation_path).await;
        if let Some(driving) = &animation.driving_path {
            self.files.remove(driving).await;
        }
        self.store.delete_animation(animation_id).await?;

        info!(user_id = %user.user_id, animation_id = %animation_id, "Animation deleted");
        Ok(())
    }
}
