//! Context Assembly
//!
//! Builds the project context report a new session starts from: a status
//! summary plus the sections selected by the caller's focus. Pure read; all
//! sections come from one snapshot.

use std::fmt;

use serde::Serialize;

use project_memory_core::text::preview;
use project_memory_core::{
    expect_entity, ArchitectureNote, CoreError, DefectStatus, EntityId, EntityKind, ImpactLevel,
    Lesson, NaturalKey, Record, Setting, Story, StoryStatus, Task, TaskStatus,
};

use crate::services::memory::store::ProjectMemoryStore;
use crate::storage::backend::{Order, RecordReader, Scan};
use crate::utils::error::AppResult;

/// Active stories shown under current work
pub const CURRENT_STORY_LIMIT: usize = 3;
/// Open tasks shown under current work
pub const CURRENT_TASK_LIMIT: usize = 5;
/// Lessons shown under recent lessons
pub const RECENT_LESSON_LIMIT: usize = 3;
/// Characters of a lesson description kept in its preview
pub const LESSON_PREVIEW_CHARS: usize = 100;

/// Which sections a context report includes besides the status summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextFocus {
    #[default]
    All,
    Settings,
    Architecture,
    Current,
    Recent,
    /// Unrecognized focus: status summary only
    StatusOnly,
}

impl ContextFocus {
    /// Lenient parse: missing means `All`, unknown values mean `StatusOnly`.
    pub fn from_name(name: Option<&str>) -> Self {
        let name = match name.map(str::trim) {
            None | Some("") => return ContextFocus::All,
            Some(name) => name.to_lowercase(),
        };
        match name.as_str() {
            "all" => ContextFocus::All,
            "settings" => ContextFocus::Settings,
            "architecture" => ContextFocus::Architecture,
            "current" => ContextFocus::Current,
            "recent" => ContextFocus::Recent,
            _ => ContextFocus::StatusOnly,
        }
    }

    fn includes(&self, section: ContextFocus) -> bool {
        *self == ContextFocus::All || *self == section
    }
}

/// Counts and well-known commands, always present
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StatusSummary {
    pub active_stories: usize,
    pub open_tasks: usize,
    pub open_defects: usize,
    pub total_lessons: usize,
    pub start_command: Option<String>,
    pub test_command: Option<String>,
}

/// An open task with the title of its story, when that story exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextTask {
    #[serde(flatten)]
    pub task: Task,
    pub story_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonPreview {
    pub id: EntityId,
    pub title: String,
    pub category: String,
    pub impact_level: ImpactLevel,
    pub preview: String,
}

/// The assembled report. Empty sections are omitted from both the JSON and
/// the rendered text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextReport {
    pub focus: ContextFocus,
    pub summary: StatusSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub settings: Vec<Setting>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub architecture: Vec<ArchitectureNote>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub active_stories: Vec<Story>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub open_tasks: Vec<ContextTask>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recent_lessons: Vec<LessonPreview>,
}

/// Assemble the context report for `focus`.
pub fn build_context(store: &ProjectMemoryStore, focus: ContextFocus) -> AppResult<ContextReport> {
    let snapshot = store.reader()?;
    let reader = &*snapshot;

    let mut report = ContextReport {
        focus,
        summary: status_summary(reader)?,
        settings: Vec::new(),
        architecture: Vec::new(),
        active_stories: Vec::new(),
        open_tasks: Vec::new(),
        recent_lessons: Vec::new(),
    };

    if focus.includes(ContextFocus::Settings) {
        report.settings = typed(
            reader.scan(&Scan::new(EntityKind::Setting).order(Order::KeyAsc))?,
        )?;
    }

    if focus.includes(ContextFocus::Architecture) {
        report.architecture = typed(
            reader.scan(&Scan::new(EntityKind::Architecture).order(Order::KeyAsc))?,
        )?;
    }

    if focus.includes(ContextFocus::Current) {
        report.active_stories = typed(
            reader.scan(
                &Scan::new(EntityKind::Story)
                    .statuses(&[StoryStatus::Active.as_str()])
                    .order(Order::PriorityThenCreatedDesc)
                    .limit(CURRENT_STORY_LIMIT),
            )?,
        )?;

        let tasks: Vec<Task> = typed(
            reader.scan(
                &Scan::new(EntityKind::Task)
                    .statuses(&open_task_statuses())
                    .limit(CURRENT_TASK_LIMIT),
            )?,
        )?;
        for task in tasks {
            let story_title = story_title(reader, task.story_id)?;
            report.open_tasks.push(ContextTask { task, story_title });
        }
    }

    if focus.includes(ContextFocus::Recent) {
        let lessons: Vec<Lesson> = typed(
            reader.scan(&Scan::new(EntityKind::Lesson).limit(RECENT_LESSON_LIMIT))?,
        )?;
        report.recent_lessons = lessons
            .into_iter()
            .map(|lesson| LessonPreview {
                preview: preview(&lesson.description, LESSON_PREVIEW_CHARS),
                id: lesson.id,
                title: lesson.title,
                category: lesson.category,
                impact_level: lesson.impact_level,
            })
            .collect();
    }

    Ok(report)
}

fn open_task_statuses() -> Vec<&'static str> {
    TaskStatus::OPEN.iter().map(|s| s.as_str()).collect()
}

fn status_summary(reader: &dyn RecordReader) -> AppResult<StatusSummary> {
    Ok(StatusSummary {
        active_stories: reader.count(EntityKind::Story, &[StoryStatus::Active.as_str()])?,
        open_tasks: reader.count(EntityKind::Task, &open_task_statuses())?,
        open_defects: reader.count(
            EntityKind::Defect,
            &[DefectStatus::Open.as_str()],
        )?,
        total_lessons: reader.count(EntityKind::Lesson, &[])?,
        start_command: setting_value(reader, "start", "command")?,
        test_command: setting_value(reader, "test", "command")?,
    })
}

fn setting_value(reader: &dyn RecordReader, category: &str, key: &str) -> AppResult<Option<String>> {
    Ok(match reader.find(&NaturalKey::setting(category, key))? {
        Some(Record::Setting(setting)) => Some(setting.value),
        _ => None,
    })
}

/// Title of the referenced story; a dangling or missing reference yields `None`.
fn story_title(reader: &dyn RecordReader, story_id: Option<EntityId>) -> AppResult<Option<String>> {
    let Some(id) = story_id else {
        return Ok(None);
    };
    Ok(match reader.get(EntityKind::Story, id)? {
        Some(Record::Story(story)) => Some(story.title),
        _ => None,
    })
}

fn typed<T>(records: Vec<Record>) -> AppResult<Vec<T>>
where
    T: TryFrom<Record, Error = CoreError>,
{
    records
        .into_iter()
        .map(|record| expect_entity(record).map_err(Into::into))
        .collect()
}

// ============================================================================
// Rendering
// ============================================================================

impl fmt::Display for ContextReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Project Context")?;
        writeln!(f)?;

        let s = &self.summary;
        writeln!(f, "## Status")?;
        writeln!(f, "- Active stories: {}", s.active_stories)?;
        writeln!(f, "- Open tasks: {}", s.open_tasks)?;
        writeln!(f, "- Open defects: {}", s.open_defects)?;
        writeln!(f, "- Lessons recorded: {}", s.total_lessons)?;
        if let Some(ref command) = s.start_command {
            writeln!(f, "- Start command: `{}`", command)?;
        }
        if let Some(ref command) = s.test_command {
            writeln!(f, "- Test command: `{}`", command)?;
        }

        if !self.settings.is_empty() {
            writeln!(f)?;
            writeln!(f, "## Settings")?;
            for setting in &self.settings {
                write!(f, "- **{}**: {}", setting.qualified_key(), setting.value)?;
                match setting.description {
                    Some(ref description) => writeln!(f, " ({})", description)?,
                    None => writeln!(f)?,
                }
            }
        }

        if !self.architecture.is_empty() {
            writeln!(f)?;
            writeln!(f, "## Architecture")?;
            for note in &self.architecture {
                writeln!(f, "### {}", note.component)?;
                writeln!(f, "{}", note.description)?;
                if !note.tech_stack.is_empty() {
                    writeln!(f, "Tech stack: {}", note.tech_stack.join(", "))?;
                }
            }
        }

        if !self.active_stories.is_empty() || !self.open_tasks.is_empty() {
            writeln!(f)?;
            writeln!(f, "## Current Work")?;
            if !self.active_stories.is_empty() {
                writeln!(f, "### Active Stories")?;
                for story in &self.active_stories {
                    writeln!(f, "- #{} [{}] {}", story.id, story.priority, story.title)?;
                }
            }
            if !self.open_tasks.is_empty() {
                writeln!(f, "### Open Tasks")?;
                for entry in &self.open_tasks {
                    let task = &entry.task;
                    write!(f, "- #{} [{}] {}", task.id, task.status, task.title)?;
                    match (&entry.story_title, task.story_id) {
                        (Some(title), _) => writeln!(f, " (story: {})", title)?,
                        (None, Some(id)) => writeln!(f, " (story #{})", id)?,
                        (None, None) => writeln!(f)?,
                    }
                }
            }
        }

        if !self.recent_lessons.is_empty() {
            writeln!(f)?;
            writeln!(f, "## Recent Lessons")?;
            for lesson in &self.recent_lessons {
                writeln!(
                    f,
                    "- #{} {} [{}, {}]: {}",
                    lesson.id, lesson.title, lesson.category, lesson.impact_level, lesson.preview
                )?;
            }
        }

        Ok(())
    }
}
