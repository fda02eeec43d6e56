//! Project Memory System
//!
//! Per-project persistent memory: settings, architecture notes, deployment
//! procedures, stories, tasks, defects, lessons, and knowledge notes.
//!
//! ## Module Structure
//!
//! - `store` - `ProjectMemoryStore` with the write path and direct lookups
//! - `context` - Status summary and focus-selected context sections
//! - `search` - Substring search across stories, tasks, lessons, and knowledge

pub mod context;
pub mod search;
pub mod store;

pub use context::{build_context, ContextFocus, ContextReport, StatusSummary};
pub use search::{search, SearchHit, SearchReport};
pub use store::{
    ArchitectureInput, DeploymentInput, NewDefect, NewKnowledge, NewLesson, NewStory, NewTask,
    ProjectMemoryStore, SettingInput,
};
