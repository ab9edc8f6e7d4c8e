//! Storage layer.
//!
//! - `local_store`: prefixed, size-capped JSON store over any backend
//! - `memory_backend`: map-backed backend with optional capacity
//! - `file_backend`: one JSON file per key with atomic writes

pub mod file_backend;
pub mod local_store;
pub mod memory_backend;

pub use file_backend::FileBackend;
pub use local_store::LocalStore;
pub use memory_backend::MemoryBackend;
