//! Canned expression records.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A named expression backed by a canned driving video.
///
/// The expression name doubles as its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Expression {
    pub expression_id: String,
    pub expression_name: String,
    /// Driving video on disk
    pub video_path: String,
    #[serde(default)]
    pub description: String,
}

impl Expression {
    pub fn new(name: impl Into<String>, video_path: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            expression_id: name.clone(),
            description: format!("Animate the portrait with a {} expression", name),
            expression_name: name,
            video_path: video_path.into(),
        }
    }
}
