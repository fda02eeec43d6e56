//! Dispatcher Integration Tests
//!
//! Exercises the stdio protocol layer: JSON lines in, `CommandResponse`
//! envelopes out, against a file-backed store.

use serde_json::{json, Value};
use tempfile::TempDir;

use project_memory::{handle_call, handle_line, ErrorKind, ProjectMemoryStore, OPERATIONS};

fn open_store() -> (TempDir, ProjectMemoryStore) {
    let dir = TempDir::new().unwrap();
    let store = ProjectMemoryStore::open(dir.path()).unwrap();
    (dir, store)
}

fn call_json(store: &ProjectMemoryStore, line: &str) -> Value {
    serde_json::to_value(handle_line(store, line)).unwrap()
}

#[test]
fn test_every_operation_is_routed() {
    let (_dir, store) = open_store();
    for operation in OPERATIONS {
        let response = handle_call(&store, operation, json!({}));
        assert_ne!(
            response.error_kind,
            Some(ErrorKind::Protocol),
            "{} was not recognized",
            operation
        );
    }
}

#[test]
fn test_write_confirmation_shape() {
    let (_dir, store) = open_store();
    let value = call_json(
        &store,
        r#"{"operation":"learn_setting","arguments":{"category":"test","key":"command","value":"npm run test"}}"#,
    );
    assert_eq!(value["success"], true);
    assert_eq!(value["data"]["type"], "write");
    assert_eq!(value["data"]["kind"], "setting");
    assert_eq!(value["data"]["key"], "test.command");
    assert_eq!(value["data"]["action"], "created");
    assert!(value.get("error_kind").is_none());

    let value = call_json(
        &store,
        r#"{"operation":"learn_setting","arguments":{"category":"test","key":"command","value":"npm run test:ci"}}"#,
    );
    assert_eq!(value["data"]["action"], "updated");
}

#[test]
fn test_missing_arguments_default_to_empty() {
    let (_dir, store) = open_store();
    let value = call_json(&store, r#"{"operation":"get_context"}"#);
    assert_eq!(value["success"], true);
    assert_eq!(value["data"]["type"], "context");
    assert!(value["data"]["text"].as_str().unwrap().starts_with("# Project Context"));
}

#[test]
fn test_error_envelopes() {
    let (_dir, store) = open_store();

    let value = call_json(&store, r#"{"operation":"search","arguments":[1,2]}"#);
    assert_eq!(value["success"], false);
    assert_eq!(value["error_kind"], "validation");

    let value = call_json(&store, r#"{"arguments":{}}"#);
    assert_eq!(value["error_kind"], "protocol");

    let value = call_json(&store, r#"{"operation":"mark_deployed","arguments":{"environment":"prod"}}"#);
    assert_eq!(value["error_kind"], "not_found");
    assert!(value["error"].as_str().unwrap().contains("prod"));
}

#[test]
fn test_mark_deployed_after_learning_procedure() {
    let (_dir, store) = open_store();
    call_json(
        &store,
        r#"{"operation":"learn_deployment","arguments":{"environment":"prod","steps":"make release","rollback_procedure":"make rollback"}}"#,
    );

    let value = call_json(&store, r#"{"operation":"mark_deployed","arguments":{"environment":"prod"}}"#);
    assert_eq!(value["success"], true);
    assert!(value["data"]["summary"]
        .as_str()
        .unwrap()
        .starts_with("Marked prod as deployed at "));

    let value = call_json(&store, r#"{"operation":"get_record","arguments":{"kind":"deployment","id":1}}"#);
    assert_eq!(value["data"]["record"]["rollback"], "make rollback");
    assert!(!value["data"]["record"]["last_deployed_at"].is_null());
}
