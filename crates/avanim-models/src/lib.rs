//! Shared record types for the avatar animation platform.
//!
//! This crate provides Serde-serializable types for:
//! - Users, roles and subscription state
//! - Uploaded avatars
//! - Canned expressions
//! - Generated animations and their status

mod ids;

pub mod animation;
pub mod avatar;
pub mod expression;
pub mod user;

// Re-export common types
pub use animation::{Animation, AnimationId, AnimationStatus};
pub use avatar::{Avatar, AvatarId};
pub use expression::Expression;
pub use user::{ParseError, Role, SubscriptionStatus, User, UserId};
