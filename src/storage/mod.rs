//! Storage Layer
//!
//! The storage interface, its SQLite and JSON document implementations, and
//! the per-project JSON config.

pub mod backend;
pub mod config;
pub mod database;
pub mod document;

pub use backend::*;
pub use config::*;
pub use database::*;
pub use document::*;
