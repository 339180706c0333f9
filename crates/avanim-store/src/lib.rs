//! Persistence for users, avatars, expressions and animations.
//!
//! [`Store`] is the seam the API depends on. [`MemoryStore`] keeps records in
//! process for development and tests; [`FirestoreStore`] talks to Firestore
//! or its emulator.

pub mod error;
pub mod firestore;
pub mod memory;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use firestore::{FirestoreClient, FirestoreConfig, FirestoreStore, RetryConfig};
pub use memory::MemoryStore;
pub use store::{ProfileUpdate, Store};
