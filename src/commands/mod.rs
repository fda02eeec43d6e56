//! Commands
//!
//! Entry points a host calls with an operation name and its arguments.

pub mod memory;

pub use memory::*;
