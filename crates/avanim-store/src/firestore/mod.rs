//! Firestore backend over the REST API.
//!
//! Supports service-account credentials and the local emulator
//! (`FIRESTORE_EMULATOR_HOST`).

mod client;
pub mod metrics;
mod records;
mod retry;
mod store;
mod token_cache;
pub mod types;

pub use client::{FirestoreClient, FirestoreConfig};
pub use retry::RetryConfig;
pub use store::FirestoreStore;
