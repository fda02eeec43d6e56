//! Memory Scenario Integration Tests
//!
//! Drives the store the way an assistant session does:
//! - Upserting settings by (category, key)
//! - Stories with default priority and tasks linked to them
//! - Context focus selection
//! - Substring search with previews
//!
//! Every scenario runs once per backend against a temporary project root.

use tempfile::TempDir;

use project_memory_core::{EntityId, EntityKind, StoryStatus};
use project_memory::services::memory::{
    build_context, search, ContextFocus, NewLesson, NewStory, NewTask, SettingInput,
};
use project_memory::{BackendKind, ProjectMemoryStore, StoreConfig};

// ============================================================================
// Helpers
// ============================================================================

const BACKENDS: [BackendKind; 2] = [BackendKind::Sqlite, BackendKind::Document];

fn open_store(kind: BackendKind) -> (TempDir, ProjectMemoryStore) {
    let dir = TempDir::new().expect("Failed to create temp project root");
    let config = StoreConfig::default().with_backend(kind);
    let store = ProjectMemoryStore::open_with(dir.path(), &config)
        .expect("Failed to open project memory store");
    (dir, store)
}

fn setting(category: &str, key: &str, value: &str) -> SettingInput {
    SettingInput {
        category: category.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        description: None,
    }
}

fn login_story(store: &ProjectMemoryStore) -> EntityId {
    store
        .create_story(NewStory {
            title: "Add login".to_string(),
            description: "Implement OAuth login flow".to_string(),
            ..Default::default()
        })
        .unwrap()
        .id
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn test_setting_upsert_keeps_one_row() {
    for kind in BACKENDS {
        let (_dir, store) = open_store(kind);

        let first = store.learn_setting(setting("test", "command", "npm run test")).unwrap();
        assert!(first.summary.contains("test.command = \"npm run test\""), "{:?}", kind);
        let before = store.get_setting("test", "command").unwrap().unwrap();

        let second = store.learn_setting(setting("test", "command", "npm run test:ci")).unwrap();
        assert_eq!(first.id, second.id, "{:?}", kind);

        let after = store.get_setting("test", "command").unwrap().unwrap();
        assert_eq!(after.value, "npm run test:ci");
        assert!(after.updated_at > before.updated_at, "{:?}", kind);

        let report = build_context(&store, ContextFocus::Settings).unwrap();
        let matching: Vec<_> = report
            .settings
            .iter()
            .filter(|s| s.category == "test" && s.key == "command")
            .collect();
        assert_eq!(matching.len(), 1, "{:?}", kind);
    }
}

#[test]
fn test_setting_round_trip_is_exact() {
    for kind in BACKENDS {
        let (_dir, store) = open_store(kind);
        let value = "  cargo test -- --nocapture \"quoted\" ünïcode";
        store
            .learn_setting(SettingInput {
                description: Some("Run the suite\nwith output".to_string()),
                ..setting("test", "command", value)
            })
            .unwrap();

        let direct = store.get_setting("test", "command").unwrap().unwrap();
        assert_eq!(direct.value, value, "{:?}", kind);
        assert_eq!(direct.description.as_deref(), Some("Run the suite\nwith output"));

        let report = build_context(&store, ContextFocus::All).unwrap();
        assert_eq!(report.settings[0].value, value, "{:?}", kind);
        assert_eq!(report.summary.test_command.as_deref(), Some(value));
    }
}

// ============================================================================
// Stories and tasks
// ============================================================================

#[test]
fn test_story_defaults_and_linked_task() {
    for kind in BACKENDS {
        let (_dir, store) = open_store(kind);
        let story_id = login_story(&store);

        let story = store.get_story(story_id).unwrap().unwrap();
        assert_eq!(story.priority.get(), 3, "{:?}", kind);
        assert_eq!(story.status, StoryStatus::Active);

        let task = store
            .create_task(NewTask {
                story_id: Some(story_id),
                title: "Wire callback route".to_string(),
                description: "Handle the provider redirect".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            store.get_task(task.id).unwrap().unwrap().story_id,
            Some(story_id)
        );

        let report = build_context(&store, ContextFocus::Current).unwrap();
        assert_eq!(report.active_stories.len(), 1, "{:?}", kind);
        assert_eq!(report.open_tasks.len(), 1);
        assert_eq!(report.open_tasks[0].task.story_id, Some(story_id));
        assert_eq!(report.open_tasks[0].story_title.as_deref(), Some("Add login"));
    }
}

#[test]
fn test_dangling_story_reference_is_not_an_error() {
    for kind in BACKENDS {
        let (_dir, store) = open_store(kind);
        let task = store
            .create_task(NewTask {
                story_id: Some(999),
                title: "Orphan".to_string(),
                description: "Points at nothing".to_string(),
                ..Default::default()
            })
            .unwrap();

        assert!(store.get_task(task.id).unwrap().is_some(), "{:?}", kind);
        let report = build_context(&store, ContextFocus::Current).unwrap();
        assert_eq!(report.open_tasks[0].story_title, None);
        assert!(report.to_string().contains("(story #999)"));
    }
}

#[test]
fn test_ids_are_unique_per_kind() {
    for kind in BACKENDS {
        let (_dir, store) = open_store(kind);
        let ids: Vec<EntityId> = (0..4)
            .map(|i| {
                store
                    .record_lesson(NewLesson {
                        title: format!("Lesson {}", i),
                        description: "Something learned".to_string(),
                        category: "testing".to_string(),
                        ..Default::default()
                    })
                    .unwrap()
                    .id
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4], "{:?}", kind);

        let confirmation = store
            .record_lesson(NewLesson {
                title: "Another".to_string(),
                description: "More".to_string(),
                category: "testing".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(confirmation.kind, EntityKind::Lesson);
        assert_eq!(confirmation.id, 5);
    }
}

// ============================================================================
// Context and search
// ============================================================================

#[test]
fn test_settings_focus_omits_work_sections() {
    for kind in BACKENDS {
        let (_dir, store) = open_store(kind);
        store.learn_setting(setting("start", "command", "npm start")).unwrap();
        login_story(&store);
        store
            .record_lesson(NewLesson {
                title: "Pin versions".to_string(),
                description: "Unpinned deps broke CI".to_string(),
                category: "build".to_string(),
                ..Default::default()
            })
            .unwrap();

        let text = build_context(&store, ContextFocus::Settings).unwrap().to_string();
        assert!(text.contains("## Status"), "{:?}", kind);
        assert!(text.contains("## Settings"));
        assert!(!text.contains("## Current Work"));
        assert!(!text.contains("## Recent Lessons"));
    }
}

#[test]
fn test_search_finds_story_and_task() {
    for kind in BACKENDS {
        let (_dir, store) = open_store(kind);
        let story_id = login_story(&store);
        let long_description = format!("login {}", "x".repeat(300));
        store
            .create_task(NewTask {
                story_id: Some(story_id),
                title: "Wire callback route".to_string(),
                description: long_description,
                ..Default::default()
            })
            .unwrap();

        let report = search(&store, "login", None).unwrap();
        let kinds: Vec<EntityKind> = report.hits.iter().map(|h| h.kind).collect();
        assert!(kinds.contains(&EntityKind::Story), "{:?}", kind);
        assert!(kinds.contains(&EntityKind::Task), "{:?}", kind);

        let task_hit = report.hits.iter().find(|h| h.kind == EntityKind::Task).unwrap();
        assert_eq!(task_hit.preview.chars().count(), 153);
        assert!(task_hit.preview.ends_with("..."));
    }
}

#[test]
fn test_search_without_matches_is_empty_not_error() {
    for kind in BACKENDS {
        let (_dir, store) = open_store(kind);
        login_story(&store);

        let report = search(&store, "nonexistent-token-xyz", None).unwrap();
        assert!(report.is_empty(), "{:?}", kind);
        assert_eq!(
            report.to_string(),
            "No results found for \"nonexistent-token-xyz\""
        );
    }
}
