//! Status Lifecycles
//!
//! Status enums for the work-tracking entities and the transitions each one
//! allows, plus the `Severity` and `Priority` scales shared by defects,
//! lessons, and stories.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// A status enum with a fixed set of legal transitions.
pub trait Lifecycle: Copy + Eq + fmt::Display {
    /// Entity name used in transition errors ("story", "task", "defect")
    const ENTITY: &'static str;

    /// Whether moving from `self` to `next` is allowed
    fn allows(self, next: Self) -> bool;

    /// Validate a transition, returning the new status
    fn transition(self, next: Self) -> CoreResult<Self> {
        if self.allows(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                entity: Self::ENTITY,
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

/// Parse a lowercase wire name into one of `variants`.
fn parse_named<T: Copy>(kind: &str, s: &str, variants: &[(&str, T)]) -> CoreResult<T> {
    variants
        .iter()
        .find(|(name, _)| *name == s)
        .map(|(_, value)| *value)
        .ok_or_else(|| CoreError::parse(format!("Unknown {}: {}", kind, s)))
}

// ============================================================================
// Story
// ============================================================================

/// Story status: active until completed or cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
}

impl StoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryStatus::Active => "active",
            StoryStatus::Completed => "completed",
            StoryStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StoryStatus::Completed | StoryStatus::Cancelled)
    }
}

impl Lifecycle for StoryStatus {
    const ENTITY: &'static str = "story";

    fn allows(self, next: Self) -> bool {
        !self.is_terminal() && next.is_terminal()
    }
}

impl fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoryStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_named(
            "story status",
            s,
            &[
                ("active", StoryStatus::Active),
                ("completed", StoryStatus::Completed),
                ("cancelled", StoryStatus::Cancelled),
            ],
        )
    }
}

// ============================================================================
// Task
// ============================================================================

/// Task status: todo -> in_progress -> completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    /// Statuses counted as open work
    pub const OPEN: [TaskStatus; 2] = [TaskStatus::Todo, TaskStatus::InProgress];

    pub fn is_open(&self) -> bool {
        Self::OPEN.contains(self)
    }
}

impl Lifecycle for TaskStatus {
    const ENTITY: &'static str = "task";

    fn allows(self, next: Self) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Todo, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Completed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_named(
            "task status",
            s,
            &[
                ("todo", TaskStatus::Todo),
                ("in_progress", TaskStatus::InProgress),
                ("completed", TaskStatus::Completed),
            ],
        )
    }
}

// ============================================================================
// Defect
// ============================================================================

/// Defect status: open -> in_progress -> resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
}

impl DefectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefectStatus::Open => "open",
            DefectStatus::InProgress => "in_progress",
            DefectStatus::Resolved => "resolved",
        }
    }
}

impl Lifecycle for DefectStatus {
    const ENTITY: &'static str = "defect";

    fn allows(self, next: Self) -> bool {
        matches!(
            (self, next),
            (DefectStatus::Open, DefectStatus::InProgress)
                | (DefectStatus::InProgress, DefectStatus::Resolved)
        )
    }
}

impl fmt::Display for DefectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DefectStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_named(
            "defect status",
            s,
            &[
                ("open", DefectStatus::Open),
                ("in_progress", DefectStatus::InProgress),
                ("resolved", DefectStatus::Resolved),
            ],
        )
    }
}

// ============================================================================
// Severity / impact level
// ============================================================================

/// Four-step scale used for defect severity and lesson impact level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

/// Lessons use the same scale under a different name.
pub type ImpactLevel = Severity;

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_named(
            "severity",
            s,
            &[
                ("critical", Severity::Critical),
                ("high", Severity::High),
                ("medium", Severity::Medium),
                ("low", Severity::Low),
            ],
        )
    }
}

// ============================================================================
// Priority
// ============================================================================

/// Story priority, 1 (critical) through 5. Defaults to 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const CRITICAL: Priority = Priority(1);
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> CoreResult<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Priority(value))
        } else {
            Err(CoreError::validation(format!(
                "priority must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )))
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority(3)
    }
}

impl TryFrom<u8> for Priority {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Priority::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> u8 {
        priority.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_transitions() {
        assert!(StoryStatus::Active.allows(StoryStatus::Completed));
        assert!(StoryStatus::Active.allows(StoryStatus::Cancelled));
        assert!(!StoryStatus::Active.allows(StoryStatus::Active));
        assert!(!StoryStatus::Completed.allows(StoryStatus::Active));
        assert!(!StoryStatus::Cancelled.allows(StoryStatus::Completed));
        assert!(!StoryStatus::Active.is_terminal());
        assert!(StoryStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_task_transitions() {
        assert!(TaskStatus::Todo.allows(TaskStatus::InProgress));
        assert!(TaskStatus::InProgress.allows(TaskStatus::InProgress));
        assert!(TaskStatus::InProgress.allows(TaskStatus::Completed));
        assert!(!TaskStatus::Todo.allows(TaskStatus::Completed));
        assert!(!TaskStatus::Completed.allows(TaskStatus::Todo));
    }

    #[test]
    fn test_defect_transitions() {
        assert!(DefectStatus::Open.allows(DefectStatus::InProgress));
        assert!(DefectStatus::InProgress.allows(DefectStatus::Resolved));
        assert!(!DefectStatus::Open.allows(DefectStatus::Resolved));
        assert!(!DefectStatus::Resolved.allows(DefectStatus::Open));
    }

    #[test]
    fn test_transition_error_names_states() {
        let err = TaskStatus::Completed
            .transition(TaskStatus::Todo)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid task status transition: completed -> todo"
        );
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("resolved".parse::<DefectStatus>().unwrap(), DefectStatus::Resolved);
        assert_eq!("cancelled".parse::<StoryStatus>().unwrap(), StoryStatus::Cancelled);
        assert!("done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let parsed: DefectStatus = serde_json::from_str("\"open\"").unwrap();
        assert_eq!(parsed, DefectStatus::Open);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(StoryStatus::default(), StoryStatus::Active);
        assert_eq!(TaskStatus::default(), TaskStatus::Todo);
        assert_eq!(DefectStatus::default(), DefectStatus::Open);
        assert_eq!(Severity::default(), Severity::Medium);
        assert_eq!(Priority::default().get(), 3);
    }

    #[test]
    fn test_priority_bounds() {
        assert!(Priority::new(0).is_err());
        assert!(Priority::new(6).is_err());
        assert_eq!(Priority::new(1).unwrap(), Priority::CRITICAL);
        assert!(serde_json::from_str::<Priority>("9").is_err());
        assert_eq!(serde_json::from_str::<Priority>("2").unwrap().get(), 2);
    }
}
