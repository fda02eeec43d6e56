//! Project Memory - Rust Library
//!
//! Per-project persistent memory for assistant sessions. It includes:
//! - The stdio command dispatcher (`commands`)
//! - The memory store with its context and search readers (`services`)
//! - Storage backends (SQLite, JSON document) and config loading (`storage`)
//! - Request/response models and utilities

pub mod commands;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

// Re-export commonly used items from commands
pub use commands::{execute, handle_call, handle_line};
pub use models::request::{CallEnvelope, MemoryRequest, OPERATIONS};
pub use models::response::*;
pub use models::settings::{BackendKind, StoreConfig};
pub use services::memory::{build_context, search, ContextFocus, ProjectMemoryStore};
pub use storage::{ConfigService, DocumentBackend, SqliteBackend, StorageBackend};
pub use utils::error::{AppError, AppResult, ErrorKind};
