#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
};

use aniguess_back::{
    config::AppConfig,
    dao::{
        file_store::FileStore,
        quiz_store::{
            QuizStore,
            sqlite::{SqliteConfig, SqliteQuizStore},
        },
        storage::StorageResult,
    },
    services::uploads::UploadedFile,
    state::{AppState, SharedState},
};
use futures::future::BoxFuture;

/// Uploads kept in memory so tests can assert on what was stored or removed.
#[derive(Clone, Default)]
pub struct MemoryFileStore {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    next: Arc<AtomicU32>,
}

impl MemoryFileStore {
    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.files.lock().unwrap().contains_key(reference)
    }
}

impl FileStore for MemoryFileStore {
    fn store(&self, original_name: String, bytes: Vec<u8>) -> BoxFuture<'static, StorageResult<String>> {
        let files = self.files.clone();
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            let reference = format!("/uploads/{id}-{original_name}");
            files.lock().unwrap().insert(reference.clone(), bytes);
            Ok(reference)
        })
    }

    fn remove(&self, reference: String) -> BoxFuture<'static, StorageResult<()>> {
        let files = self.files.clone();
        Box::pin(async move {
            files.lock().unwrap().remove(&reference);
            Ok(())
        })
    }
}

/// Fresh SQLite database file under the system temp dir.
pub async fn create_test_store() -> SqliteQuizStore {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let path = std::env::temp_dir().join(format!(
        "aniguess_test_{}_{}.db",
        std::process::id(),
        id
    ));
    // Clean up leftover files from previous runs
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
    let url = format!("sqlite://{}", path.display());
    SqliteQuizStore::connect(SqliteConfig::from_url(url))
        .await
        .expect("failed to create test database")
}

/// Application state with a fresh store installed and an in-memory file store.
pub async fn create_test_state() -> (SharedState, MemoryFileStore) {
    create_test_state_with(AppConfig::default()).await
}

/// Same as [`create_test_state`] with custom limits.
pub async fn create_test_state_with(config: AppConfig) -> (SharedState, MemoryFileStore) {
    let files = MemoryFileStore::default();
    let state = AppState::new(config, Arc::new(files.clone()));
    let store: Arc<dyn QuizStore> = Arc::new(create_test_store().await);
    state.set_quiz_store(store).await;
    (state, files)
}

/// Application state that never received a store.
pub fn degraded_state() -> SharedState {
    AppState::new(AppConfig::default(), Arc::new(MemoryFileStore::default()))
}

pub fn image(name: &str) -> UploadedFile {
    UploadedFile::new(name, vec![0xFF, 0xD8, 0xFF, 0xE0])
}
