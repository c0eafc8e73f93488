/// Local JSON snapshot cache.
pub mod local_cache;
/// Database model definitions.
pub mod models;
/// Remote document store abstraction and its backends.
pub mod remote_store;
/// Storage abstraction layer for database operations.
pub mod storage;
