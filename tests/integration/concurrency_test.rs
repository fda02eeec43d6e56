//! Concurrent Writer Integration Tests
//!
//! Several threads on one store, and several store instances on one project
//! root, must never duplicate a keyed row, lose a write, or reuse an id.

use std::collections::HashSet;
use std::thread;

use tempfile::TempDir;

use project_memory::services::memory::{build_context, ContextFocus, NewStory, SettingInput};
use project_memory::{BackendKind, ProjectMemoryStore, StoreConfig};
use project_memory_core::EntityId;

const BACKENDS: [BackendKind; 2] = [BackendKind::Sqlite, BackendKind::Document];
const THREADS: usize = 8;
const WRITES_PER_THREAD: usize = 10;

fn open_at(dir: &TempDir, kind: BackendKind) -> ProjectMemoryStore {
    let config = StoreConfig::default().with_backend(kind);
    ProjectMemoryStore::open_with(dir.path(), &config).expect("Failed to open store")
}

fn test_command(value: String) -> SettingInput {
    SettingInput {
        category: "test".to_string(),
        key: "command".to_string(),
        value,
        description: None,
    }
}

fn story(title: String) -> NewStory {
    NewStory {
        title,
        description: "Concurrent write".to_string(),
        ..Default::default()
    }
}

#[test]
fn test_threads_share_one_store() {
    for kind in BACKENDS {
        let dir = TempDir::new().unwrap();
        let store = open_at(&dir, kind);

        let ids: Vec<EntityId> = thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|t| {
                    let store = &store;
                    scope.spawn(move || {
                        let mut ids = Vec::new();
                        for i in 0..WRITES_PER_THREAD {
                            store
                                .learn_setting(test_command(format!("run {}-{}", t, i)))
                                .unwrap();
                            ids.push(store.create_story(story(format!("story {}-{}", t, i))).unwrap().id);
                        }
                        ids
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let unique: HashSet<EntityId> = ids.iter().copied().collect();
        assert_eq!(unique.len(), THREADS * WRITES_PER_THREAD, "{:?}", kind);

        let report = build_context(&store, ContextFocus::All).unwrap();
        assert_eq!(report.summary.active_stories, THREADS * WRITES_PER_THREAD, "{:?}", kind);
        let rows = report
            .settings
            .iter()
            .filter(|s| s.category == "test" && s.key == "command")
            .count();
        assert_eq!(rows, 1, "{:?}", kind);
    }
}

#[test]
fn test_two_instances_on_one_root() {
    for kind in BACKENDS {
        let dir = TempDir::new().unwrap();
        let host = open_at(&dir, kind);
        let one_shot = open_at(&dir, kind);

        let a = host.create_story(story("from host".to_string())).unwrap();
        let b = one_shot.create_story(story("from call".to_string())).unwrap();
        assert_eq!((a.id, b.id), (1, 2), "{:?}", kind);

        host.learn_setting(test_command("npm test".to_string())).unwrap();
        let second = one_shot
            .learn_setting(test_command("npm run test:ci".to_string()))
            .unwrap();
        assert_eq!(second.summary, "Updated setting test.command = \"npm run test:ci\"");
        assert_eq!(
            host.get_setting("test", "command").unwrap().unwrap().value,
            "npm run test:ci",
            "{:?}",
            kind
        );

        drop(host);
        drop(one_shot);
        let reopened = open_at(&dir, kind);
        assert_eq!(reopened.get_story(1).unwrap().unwrap().title, "from host", "{:?}", kind);
        assert_eq!(reopened.get_story(2).unwrap().unwrap().title, "from call", "{:?}", kind);
        assert_eq!(reopened.create_story(story("third".to_string())).unwrap().id, 3);
    }
}

#[test]
fn test_instances_write_from_parallel_threads() {
    for kind in BACKENDS {
        let dir = TempDir::new().unwrap();
        let stores: Vec<ProjectMemoryStore> = (0..2).map(|_| open_at(&dir, kind)).collect();

        let ids: Vec<EntityId> = thread::scope(|scope| {
            let handles: Vec<_> = stores
                .iter()
                .enumerate()
                .map(|(n, store)| {
                    scope.spawn(move || {
                        (0..WRITES_PER_THREAD)
                            .map(|i| store.create_story(story(format!("{}-{}", n, i))).unwrap().id)
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let unique: HashSet<EntityId> = ids.iter().copied().collect();
        assert_eq!(unique.len(), 2 * WRITES_PER_THREAD, "{:?}", kind);

        let report = build_context(&stores[0], ContextFocus::StatusOnly).unwrap();
        assert_eq!(report.summary.active_stories, 2 * WRITES_PER_THREAD, "{:?}", kind);
    }
}
