/// Persistence for uploaded images.
pub mod file_store;
/// Database model definitions.
pub mod models;
/// Quiz content, guess ledger and aggregate storage.
pub mod quiz_store;
/// Storage abstraction layer for database operations.
pub mod storage;
