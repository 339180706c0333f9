//! Business logic services.

pub mod animation;
pub mod avatars;
pub mod catalog;
pub mod files;
pub mod user;

pub use animation::{AnimationService, AnimationView, Generated};
pub use avatars::AvatarService;
pub use catalog::{list_expressions, seed_expressions};
pub use files::MediaFiles;
pub use user::{AdminAction, UserService};
