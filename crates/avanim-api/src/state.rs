//! Application state.

use std::sync::Arc;

use tracing::info;

use avanim_media::AnimatorHandle;
use avanim_store::{FirestoreStore, MemoryStore, Store, StoreResult};

use crate::auth::SessionKeys;
use crate::config::{ApiConfig, StoreBackend};
use crate::services::{AnimationService, AvatarService, MediaFiles, UserService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn Store>,
    pub animator: AnimatorHandle,
    pub sessions: Arc<SessionKeys>,
    pub files: MediaFiles,
    pub user_service: UserService,
    pub avatar_service: AvatarService,
    pub animation_service: AnimationService,
}

impl AppState {
    /// Wire services around an already constructed store and model handle.
    pub fn new(config: ApiConfig, store: Arc<dyn Store>, animator: AnimatorHandle) -> Self {
        let files = MediaFiles::new(config.static_root.clone());
        let sessions = Arc::new(SessionKeys::new(&config.jwt_secret, config.session_ttl));

        let user_service = UserService::new(Arc::clone(&store), files.clone());
        let avatar_service = AvatarService::new(Arc::clone(&store), files.clone());
        let animation_service = AnimationService::new(
            Arc::clone(&store),
            files.clone(),
            avatar_service.clone(),
            animator.clone(),
        );

        Self {
            config,
            store,
            animator,
            sessions,
            files,
            user_service,
            avatar_service,
            animation_service,
        }
    }
}

/// Build the configured store backend.
pub async fn build_store(config: &ApiConfig) -> StoreResult<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Firestore => Arc::new(FirestoreStore::from_env().await?),
    };
    info!(backend = store.backend(), "Store ready");
    Ok(store)
}
