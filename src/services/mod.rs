//! Services
//!
//! Business logic services, called by the command dispatcher.

pub mod memory;

pub use memory::ProjectMemoryStore;
