//! Generated animation records.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::avatar::AvatarId;
use crate::ids::string_id;
use crate::user::UserId;

string_id!(
    /// Unique identifier for a generated animation.
    AnimationId
);

/// Animation generation status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum AnimationStatus {
    /// Generation has been requested and is running
    #[default]
    Processing,
    /// Output video written
    Completed,
    /// Generation failed; see `error_message`
    Failed,
}

impl AnimationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnimationStatus::Processing => "processing",
            AnimationStatus::Completed => "completed",
            AnimationStatus::Failed => "failed",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "completed" => AnimationStatus::Completed,
            "failed" => AnimationStatus::Failed,
            _ => AnimationStatus::Processing,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AnimationStatus::Completed | AnimationStatus::Failed)
    }
}

impl fmt::Display for AnimationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A generated (or in-flight) animation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Animation {
    pub animation_id: AnimationId,
    /// Owner
    pub user_id: UserId,
    pub avatar_id: AvatarId,
    /// Canned expression used, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression_id: Option<String>,
    /// Custom driving upload relative to the static root, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driving_path: Option<String>,
    /// Output path relative to the static root
    pub animation_path: String,
    #[serde(default)]
    pub status: AnimationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Animation {
    /// Create a processing record for a canned expression.
    pub fn for_expression(
        user_id: UserId,
        avatar_id: AvatarId,
        expression_id: impl Into<String>,
    ) -> Self {
        let mut animation = Self::new(user_id, avatar_id);
        animation.expression_id = Some(expression_id.into());
        animation
    }

    /// Create a processing record for a user-supplied driving video.
    pub fn for_driving_video(
        user_id: UserId,
        avatar_id: AvatarId,
        driving_path: impl Into<String>,
    ) -> Self {
        let mut animation = Self::new(user_id, avatar_id);
        animation.driving_path = Some(driving_path.into());
        animation
    }

    fn new(user_id: UserId, avatar_id: AvatarId) -> Self {
        let animation_id = AnimationId::new();
        Self {
            animation_path: format!("animations/animation_{}.mp4", animation_id),
            animation_id,
            user_id,
            avatar_id,
            expression_id: None,
            driving_path: None,
            status: AnimationStatus::Processing,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_animation_path_uses_id() {
        let animation = Animation::for_expression(UserId::new(), AvatarId::new(), "smile");
        assert_eq!(
            animation.animation_path,
            format!("animations/animation_{}.mp4", animation.animation_id)
        );
        assert_eq!(animation.status, AnimationStatus::Processing);
        assert_eq!(animation.expression_id.as_deref(), Some("smile"));
    }

    #[test]
    fn test_status_terminal() {
        assert!(!AnimationStatus::Processing.is_terminal());
        assert!(AnimationStatus::Failed.is_terminal());
        assert_eq!(AnimationStatus::from_str_lossy("completed"), AnimationStatus::Completed);
    }
}
