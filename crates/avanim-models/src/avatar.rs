//! Uploaded avatar records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::string_id;
use crate::user::UserId;

string_id!(
    /// Unique identifier for an uploaded avatar.
    AvatarId
);

/// A portrait image uploaded by a user.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Avatar {
    pub avatar_id: AvatarId,
    /// Owner
    pub user_id: UserId,
    /// Path relative to the static root, e.g. `avatars/<uuid>_face.png`
    pub avatar_path: String,
    pub created_at: DateTime<Utc>,
}

impl Avatar {
    pub fn new(user_id: UserId, avatar_path: impl Into<String>) -> Self {
        Self {
            avatar_id: AvatarId::new(),
            user_id,
            avatar_path: avatar_path.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }
}
