mod cache;
mod pack_locks;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::{file_store::FileStore, quiz_store::QuizStore},
    error::ServiceError,
};

pub use self::cache::CacheOverlay;
pub use self::pack_locks::PackLocks;

pub type SharedState = Arc<AppState>;

/// Central application state: storage handles, the read cache and runtime configuration.
pub struct AppState {
    quiz_store: RwLock<Option<Arc<dyn QuizStore>>>,
    file_store: Arc<dyn FileStore>,
    cache: CacheOverlay,
    pack_locks: PackLocks,
    config: AppConfig,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a quiz store is installed.
    pub fn new(config: AppConfig, file_store: Arc<dyn FileStore>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            quiz_store: RwLock::new(None),
            file_store,
            cache: CacheOverlay::new(),
            pack_locks: PackLocks::new(),
            config,
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current quiz store, if one is installed.
    pub async fn quiz_store(&self) -> Option<Arc<dyn QuizStore>> {
        let guard = self.quiz_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current quiz store, or [`ServiceError::Degraded`] while none is installed.
    pub async fn require_quiz_store(&self) -> Result<Arc<dyn QuizStore>, ServiceError> {
        self.quiz_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new quiz store implementation and leave degraded mode.
    pub async fn set_quiz_store(&self, store: Arc<dyn QuizStore>) {
        {
            let mut guard = self.quiz_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    pub fn file_store(&self) -> &Arc<dyn FileStore> {
        &self.file_store
    }

    pub fn cache(&self) -> &CacheOverlay {
        &self.cache
    }

    pub fn pack_locks(&self) -> &PackLocks {
        &self.pack_locks
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        if self.quiz_store.read().await.is_none() {
            return true;
        }
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}
