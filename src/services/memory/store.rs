//! Project Memory Store
//!
//! Write path and direct lookups for one project's memory. Validation and
//! timestamping happen here; the storage backend only persists records, so
//! both backends behave identically.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use project_memory_core::text::{normalize_list, normalize_set, require_text};
use project_memory_core::{
    expect_entity, later_than, ArchitectureNote, Defect, DefectStatus, DeploymentProcedure,
    EntityId, EntityKind, KnowledgeNote, Lesson, Lifecycle, MonotonicClock, NaturalKey, Priority,
    Record, Setting, Severity, Story, StoryStatus, Task, TaskStatus, Timestamp,
    DEFAULT_KNOWLEDGE_CATEGORY,
};

use crate::models::request::string_list;
use crate::models::response::{WriteAction, WriteConfirmation};
use crate::models::settings::{BackendKind, StoreConfig};
use crate::storage::backend::{RecordReader, StorageBackend, Upserted};
use crate::storage::config::ConfigService;
use crate::storage::database::SqliteBackend;
use crate::storage::document::DocumentBackend;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::data_file_path;

// ============================================================================
// Inputs
// ============================================================================

/// Arguments for `learn_setting`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingInput {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    pub description: Option<String>,
}

/// Arguments for `learn_architecture`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchitectureInput {
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "string_list")]
    pub tech_stack: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub file_paths: Vec<String>,
    pub patterns: Option<String>,
}

/// Arguments for `learn_deployment`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentInput {
    #[serde(default)]
    pub environment: String,
    pub target_host: Option<String>,
    #[serde(default, alias = "deployment_steps")]
    pub steps: String,
    #[serde(alias = "test_verification")]
    pub verification: Option<String>,
    #[serde(alias = "rollback_procedure")]
    pub rollback: Option<String>,
}

/// Arguments for `create_story`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewStory {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub priority: Option<u8>,
    #[serde(default, deserialize_with = "string_list")]
    pub files_affected: Vec<String>,
}

/// Arguments for `create_task`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    pub story_id: Option<EntityId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "string_list")]
    pub files_affected: Vec<String>,
}

/// Arguments for `log_defect`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDefect {
    pub story_id: Option<EntityId>,
    pub task_id: Option<EntityId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: Option<Severity>,
    pub status: Option<DefectStatus>,
    #[serde(default, deserialize_with = "string_list")]
    pub files_affected: Vec<String>,
}

/// Arguments for `record_lesson`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewLesson {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub impact_level: Option<Severity>,
    #[serde(default, deserialize_with = "string_list")]
    pub related_files: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub tags: Vec<String>,
}

/// Arguments for `add_knowledge`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewKnowledge {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub tags: Vec<String>,
}

// ============================================================================
// Store
// ============================================================================

/// One project's memory, backed by a single storage backend.
pub struct ProjectMemoryStore {
    backend: Arc<dyn StorageBackend>,
    clock: MonotonicClock,
}

impl ProjectMemoryStore {
    /// Open the store for `project_root`, honoring its config file if present.
    pub fn open(project_root: &Path) -> AppResult<Self> {
        let config = ConfigService::load(project_root)?;
        Self::open_with(project_root, config.get_config())
    }

    /// Open the store for `project_root` with an explicit configuration.
    pub fn open_with(project_root: &Path, config: &StoreConfig) -> AppResult<Self> {
        config.validate().map_err(AppError::config)?;
        let path = data_file_path(project_root, config);

        let backend: Arc<dyn StorageBackend> = match config.backend {
            BackendKind::Sqlite => Arc::new(SqliteBackend::open(&path)?),
            BackendKind::Document => Arc::new(DocumentBackend::open(&path)?),
        };

        tracing::info!(
            "[ProjectMemoryStore] Opened {} store at {}",
            backend.name(),
            path.display()
        );
        Ok(Self::with_backend(backend))
    }

    /// Create a store over an existing backend
    pub fn with_backend(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            clock: MonotonicClock::new(),
        }
    }

    /// A store that never touches the filesystem
    pub fn in_memory(kind: BackendKind) -> AppResult<Self> {
        let backend: Arc<dyn StorageBackend> = match kind {
            BackendKind::Sqlite => Arc::new(SqliteBackend::new_in_memory()?),
            BackendKind::Document => Arc::new(DocumentBackend::new_in_memory()),
        };
        Ok(Self::with_backend(backend))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Consistent read view used by context assembly and search.
    ///
    /// Drop it before writing: an in-memory SQLite store has one connection.
    pub fn reader(&self) -> AppResult<Box<dyn RecordReader + '_>> {
        self.backend.snapshot()
    }

    // ========================================================================
    // Upserts
    // ========================================================================

    /// Record a setting, replacing any setting with the same (category, key).
    pub fn learn_setting(&self, input: SettingInput) -> AppResult<WriteConfirmation> {
        require_text("category", &input.category)?;
        require_text("key", &input.key)?;
        require_text("value", &input.value)?;

        let category = input.category.trim().to_string();
        let key_name = input.key.trim().to_string();
        let key = NaturalKey::setting(&category, &key_name);
        let now = self.clock.now();

        let outcome = self.backend.upsert(&key, &mut |existing| {
            let (created_at, updated_at) = upsert_stamps(existing, now);
            Ok(Record::Setting(Setting {
                id: 0,
                category: category.clone(),
                key: key_name.clone(),
                value: input.value.clone(),
                description: input.description.clone(),
                created_at,
                updated_at,
            }))
        })?;

        let verb = if outcome.inserted { "Learned" } else { "Updated" };
        let setting: Setting = expect_entity(outcome.record.clone())?;
        let summary = format!(
            "{} setting {} = \"{}\"",
            verb,
            setting.qualified_key(),
            setting.value
        );
        Ok(self.confirm_upsert(outcome, &key, summary))
    }

    /// Record the architecture note for a component, replacing the previous one.
    pub fn learn_architecture(&self, input: ArchitectureInput) -> AppResult<WriteConfirmation> {
        require_text("component", &input.component)?;
        require_text("description", &input.description)?;

        let component = input.component.trim().to_string();
        let key = NaturalKey::Component(component.clone());
        let tech_stack = normalize_list(&input.tech_stack);
        let file_paths = normalize_list(&input.file_paths);
        let now = self.clock.now();

        let outcome = self.backend.upsert(&key, &mut |existing| {
            let (created_at, updated_at) = upsert_stamps(existing, now);
            Ok(Record::Architecture(ArchitectureNote {
                id: 0,
                component: component.clone(),
                description: input.description.clone(),
                tech_stack: tech_stack.clone(),
                file_paths: file_paths.clone(),
                patterns: input.patterns.clone(),
                created_at,
                updated_at,
            }))
        })?;

        let verb = if outcome.inserted { "Recorded" } else { "Updated" };
        let mut summary = format!("{} architecture for {}", verb, component);
        if !tech_stack.is_empty() {
            summary.push_str(&format!(" ({})", tech_stack.join(", ")));
        }
        Ok(self.confirm_upsert(outcome, &key, summary))
    }

    /// Record how to deploy to an environment. A previous `last_deployed_at`
    /// survives the replacement.
    pub fn learn_deployment(&self, input: DeploymentInput) -> AppResult<WriteConfirmation> {
        require_text("environment", &input.environment)?;
        require_text("steps", &input.steps)?;

        let environment = input.environment.trim().to_string();
        let key = NaturalKey::Environment(environment.clone());
        let now = self.clock.now();

        let outcome = self.backend.upsert(&key, &mut |existing| {
            let (created_at, updated_at) = upsert_stamps(existing, now);
            let last_deployed_at = match existing {
                Some(Record::Deployment(d)) => d.last_deployed_at,
                _ => None,
            };
            Ok(Record::Deployment(DeploymentProcedure {
                id: 0,
                environment: environment.clone(),
                target_host: input.target_host.clone(),
                steps: input.steps.clone(),
                verification: input.verification.clone(),
                rollback: input.rollback.clone(),
                last_deployed_at,
                created_at,
                updated_at,
            }))
        })?;

        let verb = if outcome.inserted { "Recorded" } else { "Updated" };
        let summary = format!("{} deployment procedure for {}", verb, environment);
        Ok(self.confirm_upsert(outcome, &key, summary))
    }

    /// Stamp an environment's procedure as just deployed.
    pub fn mark_deployed(&self, environment: &str) -> AppResult<WriteConfirmation> {
        require_text("environment", environment)?;
        let environment = environment.trim();

        let id = {
            let reader = self.reader()?;
            reader
                .find(&NaturalKey::Environment(environment.to_string()))?
                .map(|r| r.id())
                .ok_or_else(|| {
                    AppError::not_found(format!(
                        "No deployment procedure for environment '{}'",
                        environment
                    ))
                })?
        };

        let now = self.clock.now();
        let record = self.backend.modify(EntityKind::Deployment, id, &mut |record| {
            let procedure = deployment_mut(record)?;
            let stamp = later_than(now, procedure.updated_at);
            procedure.last_deployed_at = Some(stamp);
            procedure.updated_at = stamp;
            Ok(())
        })?;

        let procedure: DeploymentProcedure = expect_entity(record)?;
        let deployed_at = procedure.last_deployed_at.unwrap_or(procedure.updated_at);
        Ok(self.confirm(
            EntityKind::Deployment,
            procedure.id,
            Some(procedure.environment.clone()),
            WriteAction::Updated,
            format!(
                "Marked {} as deployed at {}",
                procedure.environment,
                deployed_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
        ))
    }

    // ========================================================================
    // Appends
    // ========================================================================

    pub fn create_story(&self, input: NewStory) -> AppResult<WriteConfirmation> {
        require_text("title", &input.title)?;
        require_text("description", &input.description)?;
        let priority = match input.priority {
            Some(value) => Priority::new(value)?,
            None => Priority::default(),
        };

        let now = self.clock.now();
        let record = self.backend.append(Record::Story(Story {
            id: 0,
            title: input.title.trim().to_string(),
            description: input.description,
            status: StoryStatus::Active,
            priority,
            files_affected: normalize_list(&input.files_affected),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }))?;

        let summary = format!(
            "Created story #{}: {} (priority {})",
            record.id(),
            title_of(&record),
            priority.get()
        );
        Ok(self.confirm_append(&record, summary))
    }

    /// Create a task. `story_id` is stored as given; the story need not exist.
    pub fn create_task(&self, input: NewTask) -> AppResult<WriteConfirmation> {
        require_text("title", &input.title)?;
        require_text("description", &input.description)?;
        let status = input.status.unwrap_or_default();
        if !status.is_open() {
            return Err(AppError::validation(format!(
                "a task cannot be created with status {}",
                status
            )));
        }

        let now = self.clock.now();
        let record = self.backend.append(Record::Task(Task {
            id: 0,
            story_id: input.story_id,
            title: input.title.trim().to_string(),
            description: input.description,
            status,
            files_affected: normalize_list(&input.files_affected),
            implementation_notes: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }))?;

        let mut summary = format!("Created task #{}: {}", record.id(), title_of(&record));
        if let Some(story_id) = input.story_id {
            summary.push_str(&format!(" (story #{})", story_id));
        }
        Ok(self.confirm_append(&record, summary))
    }

    pub fn log_defect(&self, input: NewDefect) -> AppResult<WriteConfirmation> {
        require_text("title", &input.title)?;
        require_text("description", &input.description)?;
        let status = input.status.unwrap_or_default();
        if status == DefectStatus::Resolved {
            return Err(AppError::validation(
                "a defect cannot be logged as resolved",
            ));
        }
        let severity = input.severity.unwrap_or_default();

        let now = self.clock.now();
        let record = self.backend.append(Record::Defect(Defect {
            id: 0,
            story_id: input.story_id,
            task_id: input.task_id,
            title: input.title.trim().to_string(),
            description: input.description,
            severity,
            status,
            files_affected: normalize_list(&input.files_affected),
            fix_description: None,
            created_at: now,
            resolved_at: None,
        }))?;

        let summary = format!(
            "Logged defect #{}: {} [{}]",
            record.id(),
            title_of(&record),
            severity
        );
        Ok(self.confirm_append(&record, summary))
    }

    /// Record a lesson. Lessons are never modified afterwards.
    pub fn record_lesson(&self, input: NewLesson) -> AppResult<WriteConfirmation> {
        require_text("title", &input.title)?;
        require_text("description", &input.description)?;
        require_text("category", &input.category)?;

        let record = self.backend.append(Record::Lesson(Lesson {
            id: 0,
            title: input.title.trim().to_string(),
            description: input.description,
            category: input.category.trim().to_string(),
            impact_level: input.impact_level.unwrap_or_default(),
            related_files: normalize_list(&input.related_files),
            tags: normalize_set(&input.tags),
            created_at: self.clock.now(),
        }))?;

        let summary = format!("Recorded lesson #{}: {}", record.id(), title_of(&record));
        Ok(self.confirm_append(&record, summary))
    }

    pub fn add_knowledge(&self, input: NewKnowledge) -> AppResult<WriteConfirmation> {
        require_text("title", &input.title)?;
        require_text("content", &input.content)?;
        let category = input
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_KNOWLEDGE_CATEGORY)
            .to_string();

        let now = self.clock.now();
        let record = self.backend.append(Record::Knowledge(KnowledgeNote {
            id: 0,
            title: input.title.trim().to_string(),
            content: input.content,
            category: category.clone(),
            tags: normalize_set(&input.tags),
            created_at: now,
            updated_at: now,
        }))?;

        let summary = format!(
            "Added knowledge note #{}: {} [{}]",
            record.id(),
            title_of(&record),
            category
        );
        Ok(self.confirm_append(&record, summary))
    }

    // ========================================================================
    // Status transitions
    // ========================================================================

    pub fn update_story_status(
        &self,
        id: EntityId,
        status: StoryStatus,
    ) -> AppResult<WriteConfirmation> {
        let now = self.clock.now();
        let record = self.backend.modify(EntityKind::Story, id, &mut |record| {
            let story = story_mut(record)?;
            story.status = story.status.transition(status)?;
            story.updated_at = later_than(now, story.updated_at);
            if status == StoryStatus::Completed {
                story.completed_at = Some(story.updated_at);
            }
            Ok(())
        })?;
        Ok(self.confirm_transition(&record, status))
    }

    /// Move a task along its lifecycle, optionally recording implementation notes.
    pub fn update_task_status(
        &self,
        id: EntityId,
        status: TaskStatus,
        implementation_notes: Option<String>,
    ) -> AppResult<WriteConfirmation> {
        let notes = implementation_notes.filter(|n| !n.trim().is_empty());
        let now = self.clock.now();
        let record = self.backend.modify(EntityKind::Task, id, &mut |record| {
            let task = task_mut(record)?;
            task.status = task.status.transition(status)?;
            task.updated_at = later_than(now, task.updated_at);
            if let Some(ref notes) = notes {
                task.implementation_notes = Some(notes.clone());
            }
            if status == TaskStatus::Completed {
                task.completed_at = Some(task.updated_at);
            }
            Ok(())
        })?;
        Ok(self.confirm_transition(&record, status))
    }

    /// Move a defect along its lifecycle, optionally describing the fix.
    pub fn update_defect_status(
        &self,
        id: EntityId,
        status: DefectStatus,
        fix_description: Option<String>,
    ) -> AppResult<WriteConfirmation> {
        let fix = fix_description.filter(|f| !f.trim().is_empty());
        let now = self.clock.now();
        let record = self.backend.modify(EntityKind::Defect, id, &mut |record| {
            let defect = defect_mut(record)?;
            defect.status = defect.status.transition(status)?;
            if let Some(ref fix) = fix {
                defect.fix_description = Some(fix.clone());
            }
            if status == DefectStatus::Resolved {
                defect.resolved_at = Some(later_than(now, defect.created_at));
            }
            Ok(())
        })?;
        Ok(self.confirm_transition(&record, status))
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn get_setting(&self, category: &str, key: &str) -> AppResult<Option<Setting>> {
        let reader = self.reader()?;
        match reader.find(&NaturalKey::setting(category.trim(), key.trim()))? {
            Some(record) => Ok(Some(expect_entity(record)?)),
            None => Ok(None),
        }
    }

    pub fn get_record(&self, kind: EntityKind, id: EntityId) -> AppResult<Option<Record>> {
        self.reader()?.get(kind, id)
    }

    pub fn get_story(&self, id: EntityId) -> AppResult<Option<Story>> {
        self.get_typed(EntityKind::Story, id)
    }

    pub fn get_task(&self, id: EntityId) -> AppResult<Option<Task>> {
        self.get_typed(EntityKind::Task, id)
    }

    pub fn get_defect(&self, id: EntityId) -> AppResult<Option<Defect>> {
        self.get_typed(EntityKind::Defect, id)
    }

    fn get_typed<T>(&self, kind: EntityKind, id: EntityId) -> AppResult<Option<T>>
    where
        T: TryFrom<Record, Error = project_memory_core::CoreError>,
    {
        match self.get_record(kind, id)? {
            Some(record) => Ok(Some(expect_entity(record)?)),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn confirm(
        &self,
        kind: EntityKind,
        id: EntityId,
        key: Option<String>,
        action: WriteAction,
        summary: String,
    ) -> WriteConfirmation {
        tracing::debug!(kind = %kind, id, "[ProjectMemoryStore] {}", summary);
        WriteConfirmation {
            kind,
            id,
            key,
            action,
            summary,
        }
    }

    fn confirm_upsert(&self, outcome: Upserted, key: &NaturalKey, summary: String) -> WriteConfirmation {
        let action = if outcome.inserted {
            WriteAction::Created
        } else {
            WriteAction::Updated
        };
        self.confirm(
            outcome.record.kind(),
            outcome.record.id(),
            Some(key.to_string()),
            action,
            summary,
        )
    }

    fn confirm_append(&self, record: &Record, summary: String) -> WriteConfirmation {
        self.confirm(record.kind(), record.id(), None, WriteAction::Created, summary)
    }

    fn confirm_transition(&self, record: &Record, status: impl Lifecycle) -> WriteConfirmation {
        let summary = format!(
            "{} #{} is now {}",
            capitalize(record.kind().as_str()),
            record.id(),
            status
        );
        self.confirm(record.kind(), record.id(), None, WriteAction::Updated, summary)
    }
}

impl std::fmt::Debug for ProjectMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectMemoryStore")
            .field("backend", &self.backend)
            .finish()
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// (created_at, updated_at) for an upserted row; a replacement keeps the
/// original creation time and always moves `updated_at` forward.
fn upsert_stamps(existing: Option<&Record>, now: Timestamp) -> (Timestamp, Timestamp) {
    match existing {
        Some(current) => (current.created_at(), later_than(now, current.updated_at())),
        None => (now, now),
    }
}

fn title_of(record: &Record) -> &str {
    record.searchable_text().map(|(title, _)| title).unwrap_or("")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn wrong_kind(expected: EntityKind, record: &Record) -> AppError {
    AppError::internal(format!(
        "expected {} record, found {}",
        expected,
        record.kind()
    ))
}

fn story_mut(record: &mut Record) -> AppResult<&mut Story> {
    match record {
        Record::Story(story) => Ok(story),
        other => Err(wrong_kind(EntityKind::Story, other)),
    }
}

fn task_mut(record: &mut Record) -> AppResult<&mut Task> {
    match record {
        Record::Task(task) => Ok(task),
        other => Err(wrong_kind(EntityKind::Task, other)),
    }
}

fn defect_mut(record: &mut Record) -> AppResult<&mut Defect> {
    match record {
        Record::Defect(defect) => Ok(defect),
        other => Err(wrong_kind(EntityKind::Defect, other)),
    }
}

fn deployment_mut(record: &mut Record) -> AppResult<&mut DeploymentProcedure> {
    match record {
        Record::Deployment(procedure) => Ok(procedure),
        other => Err(wrong_kind(EntityKind::Deployment, other)),
    }
}

// ============================================================================
// Tests
// ============================================================================
