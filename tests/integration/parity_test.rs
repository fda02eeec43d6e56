//! Backend Parity Integration Tests
//!
//! Replays one call script against a SQLite store and a document store and
//! checks that every response, error kind, and rendered report matches.

use serde_json::{json, Value};

use project_memory::{handle_call, BackendKind, ProjectMemoryStore};

fn script() -> Vec<(&'static str, Value)> {
    vec![
        ("learn_setting", json!({"category": "start", "key": "command", "value": "npm start"})),
        ("learn_setting", json!({"category": "test", "key": "command", "value": "npm run test"})),
        ("learn_setting", json!({"category": "test", "key": "command", "value": "npm run test:ci"})),
        ("learn_architecture", json!({"component": "api", "description": "HTTP layer", "tech_stack": "rust, axum"})),
        ("learn_architecture", json!({"component": "api", "description": "HTTP + WS layer", "tech_stack": ["rust", "axum", "tokio"]})),
        ("learn_deployment", json!({"environment": "staging", "deployment_steps": "make deploy"})),
        ("create_story", json!({"title": "Add login", "description": "Implement OAuth login flow"})),
        ("create_story", json!({"title": "Billing", "description": "Stripe integration", "priority": 1})),
        ("create_story", json!({"title": "Bad priority", "description": "x", "priority": 9})),
        ("create_task", json!({"story_id": 1, "title": "Wire callback route", "description": "login redirect"})),
        ("create_task", json!({"story_id": 42, "title": "Orphan task", "description": "no story"})),
        ("create_task", json!({"title": "Done already", "description": "x", "status": "completed"})),
        ("update_task_status", json!({"id": 1, "status": "in_progress"})),
        ("update_task_status", json!({"id": 2, "status": "completed"})),
        ("log_defect", json!({"story_id": 1, "title": "Login loops", "description": "redirect loop on login", "severity": "high"})),
        ("update_defect_status", json!({"id": 1, "status": "in_progress"})),
        ("record_lesson", json!({"title": "Pin versions", "description": "Unpinned deps broke the login build", "category": "build", "tags": "ci, deps, ci"})),
        ("add_knowledge", json!({"title": "OAuth notes", "content": "Use PKCE for login", "category": "auth"})),
        ("add_knowledge", json!({"title": "Misc", "content": "General note"})),
        ("update_story_status", json!({"id": 2, "status": "completed"})),
        ("update_story_status", json!({"id": 2, "status": "active"})),
        ("get_setting", json!({"category": "test", "key": "command"})),
        ("get_setting", json!({"category": "nope", "key": "nope"})),
        ("get_record", json!({"kind": "architecture", "id": 1})),
        ("get_record", json!({"kind": "story", "id": 77})),
        ("get_context", json!({})),
        ("get_context", json!({"focus": "current"})),
        ("get_context", json!({"focus": "recent"})),
        ("get_context", json!({"focus": "bogus"})),
        ("search", json!({"query": "login"})),
        ("search", json!({"query": "LOGIN", "category": "auth"})),
        ("search", json!({"query": "nonexistent-token-xyz"})),
        ("search", json!({"query": "  "})),
        ("launch_rockets", json!({})),
    ]
}

/// Text and error kind of every response; record payloads are compared
/// without their timestamps.
fn replay(kind: BackendKind) -> Vec<(bool, Option<String>, String)> {
    let store = ProjectMemoryStore::in_memory(kind).unwrap();
    script()
        .into_iter()
        .map(|(operation, arguments)| {
            let response = handle_call(&store, operation, arguments);
            let kind = response
                .error_kind
                .map(|k| serde_json::to_value(k).unwrap().to_string());
            let body = match response.data {
                Some(data) => {
                    let mut value = serde_json::to_value(&data).unwrap();
                    if let Some(record) = value.get_mut("record").and_then(Value::as_object_mut) {
                        record.retain(|key, _| !key.ends_with("_at"));
                    }
                    if let Some(report) = value.get_mut("report").and_then(Value::as_object_mut) {
                        report.clear();
                    }
                    value.to_string()
                }
                None => String::new(),
            };
            (response.success, kind, body)
        })
        .collect()
}

#[test]
fn test_backends_answer_identically() {
    let sqlite = replay(BackendKind::Sqlite);
    let document = replay(BackendKind::Document);
    assert_eq!(sqlite.len(), document.len());

    for (i, ((operation, _), (a, b))) in script().iter().zip(sqlite.iter().zip(&document)).enumerate() {
        assert_eq!(a, b, "step {} ({}) differs between backends", i, operation);
    }
}

#[test]
fn test_script_outcomes() {
    let results = replay(BackendKind::Sqlite);
    let failures: Vec<usize> = results
        .iter()
        .enumerate()
        .filter(|(_, (success, _, _))| !success)
        .map(|(i, _)| i)
        .collect();

    // bad priority, completed-on-create, todo -> completed, completed -> active,
    // missing setting, missing story, blank query, unknown operation
    assert_eq!(failures, vec![8, 11, 13, 20, 22, 24, 32, 33]);

    let kinds: Vec<&str> = failures
        .iter()
        .map(|&i| results[i].1.as_deref().unwrap_or(""))
        .collect();
    assert_eq!(
        kinds,
        vec![
            "\"validation\"",
            "\"validation\"",
            "\"validation\"",
            "\"validation\"",
            "\"not_found\"",
            "\"not_found\"",
            "\"validation\"",
            "\"protocol\"",
        ]
    );
}
