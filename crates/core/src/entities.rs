//! Entity Model
//!
//! The eight persisted entity kinds and the `Record` sum type the storage
//! layer moves around. Identifiers are store-assigned and unique per kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::error::{CoreError, CoreResult};
use crate::status::{DefectStatus, ImpactLevel, Priority, Severity, StoryStatus, TaskStatus};
use crate::text::contains_folded;

/// Store-assigned identifier, unique within one entity kind
pub type EntityId = i64;

/// Default category for knowledge notes
pub const DEFAULT_KNOWLEDGE_CATEGORY: &str = "general";

// ============================================================================
// Entity kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Setting,
    Architecture,
    Deployment,
    Story,
    Task,
    Defect,
    Lesson,
    Knowledge,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Setting,
        EntityKind::Architecture,
        EntityKind::Deployment,
        EntityKind::Story,
        EntityKind::Task,
        EntityKind::Defect,
        EntityKind::Lesson,
        EntityKind::Knowledge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Setting => "setting",
            EntityKind::Architecture => "architecture",
            EntityKind::Deployment => "deployment",
            EntityKind::Story => "story",
            EntityKind::Task => "task",
            EntityKind::Defect => "defect",
            EntityKind::Lesson => "lesson",
            EntityKind::Knowledge => "knowledge",
        }
    }

    /// Whether rows of this kind carry a status column
    pub fn has_status(&self) -> bool {
        matches!(
            self,
            EntityKind::Story | EntityKind::Task | EntityKind::Defect
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::parse(format!("Unknown entity kind: {}", s)))
    }
}

// ============================================================================
// Keyed entities (upserted)
// ============================================================================

/// A project setting, unique by (category, key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub id: EntityId,
    pub category: String,
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Setting {
    /// Dotted display key, e.g. `test.command`
    pub fn qualified_key(&self) -> String {
        format!("{}.{}", self.category, self.key)
    }
}

/// Architecture note for one component; re-recording replaces it in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureNote {
    pub id: EntityId,
    pub component: String,
    pub description: String,
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub file_paths: Vec<String>,
    pub patterns: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// How to deploy to one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentProcedure {
    pub id: EntityId,
    pub environment: String,
    pub target_host: Option<String>,
    pub steps: String,
    pub verification: Option<String>,
    pub rollback: Option<String>,
    pub last_deployed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ============================================================================
// Appended entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub id: EntityId,
    pub title: String,
    pub description: String,
    pub status: StoryStatus,
    pub priority: Priority,
    #[serde(default)]
    pub files_affected: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// A unit of work. `story_id` is a weak reference: the story may not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: EntityId,
    pub story_id: Option<EntityId>,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub files_affected: Vec<String>,
    pub implementation_notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// A logged bug. `story_id` and `task_id` are weak references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defect {
    pub id: EntityId,
    pub story_id: Option<EntityId>,
    pub task_id: Option<EntityId>,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub status: DefectStatus,
    #[serde(default)]
    pub files_affected: Vec<String>,
    pub fix_description: Option<String>,
    pub created_at: Timestamp,
    pub resolved_at: Option<Timestamp>,
}

/// Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: EntityId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub impact_level: ImpactLevel,
    #[serde(default)]
    pub related_files: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeNote {
    pub id: EntityId,
    pub title: String,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ============================================================================
// Natural keys
// ============================================================================

/// Upsert key for the keyed entity kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NaturalKey {
    Setting { category: String, key: String },
    Component(String),
    Environment(String),
}

impl NaturalKey {
    pub fn setting(category: impl Into<String>, key: impl Into<String>) -> Self {
        NaturalKey::Setting {
            category: category.into(),
            key: key.into(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            NaturalKey::Setting { .. } => EntityKind::Setting,
            NaturalKey::Component(_) => EntityKind::Architecture,
            NaturalKey::Environment(_) => EntityKind::Deployment,
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NaturalKey::Setting { category, key } => write!(f, "{}.{}", category, key),
            NaturalKey::Component(component) => f.write_str(component),
            NaturalKey::Environment(environment) => f.write_str(environment),
        }
    }
}

// ============================================================================
// Record
// ============================================================================

/// Any persisted entity, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Setting(Setting),
    Architecture(ArchitectureNote),
    Deployment(DeploymentProcedure),
    Story(Story),
    Task(Task),
    Defect(Defect),
    Lesson(Lesson),
    Knowledge(KnowledgeNote),
}

macro_rules! record_variant {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for Record {
            fn from(entity: $ty) -> Self {
                Record::$variant(entity)
            }
        }

        impl TryFrom<Record> for $ty {
            type Error = CoreError;

            fn try_from(record: Record) -> Result<Self, Self::Error> {
                match record {
                    Record::$variant(entity) => Ok(entity),
                    other => Err(CoreError::internal(format!(
                        "expected {} record, found {}",
                        EntityKind::$variant,
                        other.kind()
                    ))),
                }
            }
        }
    };
}

record_variant!(Setting, Setting);
record_variant!(Architecture, ArchitectureNote);
record_variant!(Deployment, DeploymentProcedure);
record_variant!(Story, Story);
record_variant!(Task, Task);
record_variant!(Defect, Defect);
record_variant!(Lesson, Lesson);
record_variant!(Knowledge, KnowledgeNote);

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Setting(_) => EntityKind::Setting,
            Record::Architecture(_) => EntityKind::Architecture,
            Record::Deployment(_) => EntityKind::Deployment,
            Record::Story(_) => EntityKind::Story,
            Record::Task(_) => EntityKind::Task,
            Record::Defect(_) => EntityKind::Defect,
            Record::Lesson(_) => EntityKind::Lesson,
            Record::Knowledge(_) => EntityKind::Knowledge,
        }
    }

    pub fn id(&self) -> EntityId {
        match self {
            Record::Setting(e) => e.id,
            Record::Architecture(e) => e.id,
            Record::Deployment(e) => e.id,
            Record::Story(e) => e.id,
            Record::Task(e) => e.id,
            Record::Defect(e) => e.id,
            Record::Lesson(e) => e.id,
            Record::Knowledge(e) => e.id,
        }
    }

    pub fn set_id(&mut self, id: EntityId) {
        match self {
            Record::Setting(e) => e.id = id,
            Record::Architecture(e) => e.id = id,
            Record::Deployment(e) => e.id = id,
            Record::Story(e) => e.id = id,
            Record::Task(e) => e.id = id,
            Record::Defect(e) => e.id = id,
            Record::Lesson(e) => e.id = id,
            Record::Knowledge(e) => e.id = id,
        }
    }

    pub fn created_at(&self) -> Timestamp {
        match self {
            Record::Setting(e) => e.created_at,
            Record::Architecture(e) => e.created_at,
            Record::Deployment(e) => e.created_at,
            Record::Story(e) => e.created_at,
            Record::Task(e) => e.created_at,
            Record::Defect(e) => e.created_at,
            Record::Lesson(e) => e.created_at,
            Record::Knowledge(e) => e.created_at,
        }
    }

    /// Last modification time; immutable kinds report their creation time.
    pub fn updated_at(&self) -> Timestamp {
        match self {
            Record::Setting(e) => e.updated_at,
            Record::Architecture(e) => e.updated_at,
            Record::Deployment(e) => e.updated_at,
            Record::Story(e) => e.updated_at,
            Record::Task(e) => e.updated_at,
            Record::Defect(e) => e.resolved_at.unwrap_or(e.created_at),
            Record::Lesson(e) => e.created_at,
            Record::Knowledge(e) => e.updated_at,
        }
    }

    pub fn natural_key(&self) -> Option<NaturalKey> {
        match self {
            Record::Setting(e) => Some(NaturalKey::setting(&e.category, &e.key)),
            Record::Architecture(e) => Some(NaturalKey::Component(e.component.clone())),
            Record::Deployment(e) => Some(NaturalKey::Environment(e.environment.clone())),
            _ => None,
        }
    }

    /// Wire name of the status column, for kinds that have one
    pub fn status_str(&self) -> Option<&'static str> {
        match self {
            Record::Story(e) => Some(e.status.as_str()),
            Record::Task(e) => Some(e.status.as_str()),
            Record::Defect(e) => Some(e.status.as_str()),
            _ => None,
        }
    }

    pub fn priority(&self) -> Option<Priority> {
        match self {
            Record::Story(e) => Some(e.priority),
            _ => None,
        }
    }

    /// Free-text category, for kinds that have one
    pub fn category(&self) -> Option<&str> {
        match self {
            Record::Setting(e) => Some(&e.category),
            Record::Lesson(e) => Some(&e.category),
            Record::Knowledge(e) => Some(&e.category),
            _ => None,
        }
    }

    /// Title and body used by text search, for the searchable kinds
    pub fn searchable_text(&self) -> Option<(&str, &str)> {
        match self {
            Record::Story(e) => Some((&e.title, &e.description)),
            Record::Task(e) => Some((&e.title, &e.description)),
            Record::Lesson(e) => Some((&e.title, &e.description)),
            Record::Knowledge(e) => Some((&e.title, &e.content)),
            Record::Defect(e) => Some((&e.title, &e.description)),
            _ => None,
        }
    }

    /// Case-insensitive match of `needle_lower` against title or body.
    pub fn matches_text(&self, needle_lower: &str) -> bool {
        self.searchable_text()
            .map(|(title, body)| {
                contains_folded(title, needle_lower) || contains_folded(body, needle_lower)
            })
            .unwrap_or(false)
    }

    /// Sort key for `KeyAsc` ordering: the natural key for keyed kinds.
    pub fn key_sort_tuple(&self) -> (&str, &str) {
        match self {
            Record::Setting(e) => (&e.category, &e.key),
            Record::Architecture(e) => (&e.component, ""),
            Record::Deployment(e) => (&e.environment, ""),
            _ => ("", ""),
        }
    }
}

/// Convert a record into the entity type the caller expects.
pub fn expect_entity<T>(record: Record) -> CoreResult<T>
where
    T: TryFrom<Record, Error = CoreError>,
{
    T::try_from(record)
}
