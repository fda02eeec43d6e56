//! Persistence Integration Tests
//!
//! Data written through one store instance is visible to the next instance
//! opened on the same project root, and id sequences continue.

use std::fs;

use tempfile::TempDir;

use project_memory::services::memory::{NewKnowledge, NewStory, SettingInput};
use project_memory::utils::paths::{config_path, data_file_path};
use project_memory::{BackendKind, ErrorKind, ProjectMemoryStore, StoreConfig};

fn story(title: &str) -> NewStory {
    NewStory {
        title: title.to_string(),
        description: "Persisted".to_string(),
        ..Default::default()
    }
}

#[test]
fn test_reopen_keeps_records_and_sequences() {
    for kind in [BackendKind::Sqlite, BackendKind::Document] {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::default().with_backend(kind);

        {
            let store = ProjectMemoryStore::open_with(dir.path(), &config).unwrap();
            store.create_story(story("First")).unwrap();
            store.create_story(story("Second")).unwrap();
            store
                .learn_setting(SettingInput {
                    category: "start".to_string(),
                    key: "command".to_string(),
                    value: "cargo run".to_string(),
                    description: None,
                })
                .unwrap();
        }

        assert!(data_file_path(dir.path(), &config).exists(), "{:?}", kind);

        let store = ProjectMemoryStore::open_with(dir.path(), &config).unwrap();
        assert_eq!(store.get_story(2).unwrap().unwrap().title, "Second");
        assert_eq!(store.create_story(story("Third")).unwrap().id, 3, "{:?}", kind);
        assert_eq!(
            store.get_setting("start", "command").unwrap().unwrap().value,
            "cargo run"
        );
    }
}

#[test]
fn test_config_file_selects_backend() {
    let dir = TempDir::new().unwrap();
    let path = config_path(dir.path());
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, r#"{"backend": "document", "store_name": "memory"}"#).unwrap();

    let store = ProjectMemoryStore::open(dir.path()).unwrap();
    assert_eq!(store.backend_name(), "document");
    store
        .add_knowledge(NewKnowledge {
            title: "Layout".to_string(),
            content: "Everything under .claude".to_string(),
            ..Default::default()
        })
        .unwrap();

    assert!(dir.path().join(".claude").join("db").join("memory.json").exists());
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = config_path(dir.path());
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, r#"{"store_name": "../escape"}"#).unwrap();

    let err = ProjectMemoryStore::open(dir.path()).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_corrupt_document_is_a_storage_error() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::default().with_backend(BackendKind::Document);
    let path = data_file_path(dir.path(), &config);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "{ not json").unwrap();

    let err = ProjectMemoryStore::open_with(dir.path(), &config).err().unwrap();
    assert!(err.is_storage());
}
