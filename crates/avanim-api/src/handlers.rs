//! Request handlers.

pub mod account;
pub mod admin;
pub mod animations;
pub mod avatars;
pub mod expressions;
pub mod health;

pub use health::*;

use serde::Serialize;

/// Plain `{success, message}` acknowledgement.
#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
