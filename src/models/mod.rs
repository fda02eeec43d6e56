//! Data Models
//!
//! Request, response, and configuration types shared by the dispatcher and
//! the host binary.

pub mod request;
pub mod response;
pub mod settings;

pub use request::*;
pub use response::*;
pub use settings::*;
