//! Utilities
//!
//! Error types and project path resolution shared by every layer.

pub mod error;
pub mod paths;

pub use error::*;
pub use paths::*;
