//! Project Memory Core
//!
//! Entity model, status lifecycles, and error types for the project memory
//! store. This crate has zero dependencies on storage or host code (SQLite,
//! JSON documents, the stdio dispatcher).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `entities` - Entity structs, `Record`, `EntityKind`, `NaturalKey`
//! - `status` - Status enums with their legal transitions, `Severity`, `Priority`
//! - `clock` - Monotonic microsecond timestamps and their text form
//! - `text` - Preview truncation, required-field checks, list normalization
//!
//! ## Design Principles
//!
//! 1. **Only serde/thiserror/chrono** - keeps build times minimal
//! 2. **Backend-agnostic** - every rule here applies identically to each storage backend
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod clock;
pub mod entities;
pub mod error;
pub mod status;
pub mod text;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Entities ───────────────────────────────────────────────────────────
pub use entities::{
    expect_entity, ArchitectureNote, Defect, DeploymentProcedure, EntityId, EntityKind,
    KnowledgeNote, Lesson, NaturalKey, Record, Setting, Story, Task, DEFAULT_KNOWLEDGE_CATEGORY,
};

// ── Lifecycles ─────────────────────────────────────────────────────────
pub use status::{DefectStatus, ImpactLevel, Lifecycle, Priority, Severity, StoryStatus, TaskStatus};

// ── Time ───────────────────────────────────────────────────────────────
pub use clock::{later_than, MonotonicClock, Timestamp};
