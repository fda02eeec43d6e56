//! Memory Commands
//!
//! Dispatch for memory operations: decode an `(operation, arguments)` pair,
//! run it against a store, and wrap the outcome in a `CommandResponse`.

use serde_json::Value;

use crate::models::request::{CallEnvelope, MemoryRequest};
use crate::models::response::{CommandResponse, MemoryResponse};
use crate::services::memory::context::{build_context, ContextFocus};
use crate::services::memory::search::search;
use crate::services::memory::store::ProjectMemoryStore;
use crate::utils::error::{AppError, AppResult};

/// Run a decoded request against `store`.
pub fn execute(store: &ProjectMemoryStore, request: MemoryRequest) -> AppResult<MemoryResponse> {
    let response = match request {
        MemoryRequest::LearnSetting(input) => store.learn_setting(input)?.into(),
        MemoryRequest::LearnArchitecture(input) => store.learn_architecture(input)?.into(),
        MemoryRequest::LearnDeployment(input) => store.learn_deployment(input)?.into(),
        MemoryRequest::MarkDeployed(args) => store.mark_deployed(&args.environment)?.into(),
        MemoryRequest::CreateStory(input) => store.create_story(input)?.into(),
        MemoryRequest::CreateTask(input) => store.create_task(input)?.into(),
        MemoryRequest::LogDefect(input) => store.log_defect(input)?.into(),
        MemoryRequest::RecordLesson(input) => store.record_lesson(input)?.into(),
        MemoryRequest::AddKnowledge(input) => store.add_knowledge(input)?.into(),
        MemoryRequest::UpdateStoryStatus(args) => {
            store.update_story_status(args.id, args.status)?.into()
        }
        MemoryRequest::UpdateTaskStatus(args) => store
            .update_task_status(args.id, args.status, args.implementation_notes)?
            .into(),
        MemoryRequest::UpdateDefectStatus(args) => store
            .update_defect_status(args.id, args.status, args.fix_description)?
            .into(),
        MemoryRequest::GetSetting(args) => {
            let setting = store
                .get_setting(&args.category, &args.key)?
                .ok_or_else(|| {
                    AppError::not_found(format!("No setting {}.{}", args.category, args.key))
                })?;
            MemoryResponse::Record {
                record: setting.into(),
            }
        }
        MemoryRequest::GetRecord(args) => {
            let record = store
                .get_record(args.kind, args.id)?
                .ok_or_else(|| AppError::not_found(format!("{} #{} not found", args.kind, args.id)))?;
            MemoryResponse::Record { record }
        }
        MemoryRequest::GetContext(args) => {
            let focus = ContextFocus::from_name(args.focus.as_deref());
            build_context(store, focus)?.into()
        }
        MemoryRequest::Search(args) => search(store, &args.query, args.category.as_deref())?.into(),
    };
    Ok(response)
}

/// Decode and run one call.
///
/// Unknown operations come back as protocol errors and undecodable arguments
/// as validation errors. Storage failures are logged here before returning.
pub fn handle_call(
    store: &ProjectMemoryStore,
    operation: &str,
    arguments: Value,
) -> CommandResponse<MemoryResponse> {
    let result = MemoryRequest::parse(operation, arguments).and_then(|request| execute(store, request));

    if let Err(ref e) = result {
        if e.is_storage() {
            tracing::error!("[commands] {} failed: {}", operation, e);
        } else {
            tracing::debug!("[commands] {} rejected: {}", operation, e);
        }
    }

    CommandResponse::from(result)
}

/// Handle one raw JSON line of the stdio protocol.
pub fn handle_line(store: &ProjectMemoryStore, line: &str) -> CommandResponse<MemoryResponse> {
    match serde_json::from_str::<CallEnvelope>(line) {
        Ok(envelope) => handle_call(store, &envelope.operation, envelope.arguments),
        Err(e) => {
            let err = AppError::protocol(format!("Malformed request: {}", e));
            tracing::warn!("[commands] {}", err);
            CommandResponse::from_error(&err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::settings::BackendKind;
    use crate::utils::error::ErrorKind;
    use serde_json::json;

    fn create_test_store() -> ProjectMemoryStore {
        ProjectMemoryStore::in_memory(BackendKind::Sqlite).unwrap()
    }

    #[test]
    fn test_learn_setting_then_get() {
        let store = create_test_store();
        let response = handle_call(
            &store,
            "learn_setting",
            json!({"category": "test", "key": "command", "value": "npm run test"}),
        );
        assert!(response.success);
        assert_eq!(
            response.data.unwrap().text(),
            "Learned setting test.command = \"npm run test\""
        );

        let response = handle_call(
            &store,
            "get_setting",
            json!({"category": "test", "key": "command"}),
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["data"]["type"], "record");
        assert_eq!(json["data"]["record"]["value"], "npm run test");
    }

    #[test]
    fn test_missing_setting_is_not_found() {
        let store = create_test_store();
        let response = handle_call(&store, "get_setting", json!({"category": "x", "key": "y"}));
        assert!(!response.success);
        assert_eq!(response.error_kind, Some(ErrorKind::NotFound));
    }

    #[test]
    fn test_unknown_operation() {
        let store = create_test_store();
        let response = handle_call(&store, "delete_everything", json!({}));
        assert_eq!(response.error_kind, Some(ErrorKind::Protocol));
    }

    #[test]
    fn test_missing_required_field_names_it() {
        let store = create_test_store();
        let response = handle_call(&store, "create_story", json!({"description": "no title"}));
        assert_eq!(response.error_kind, Some(ErrorKind::Validation));
        assert!(response.error.unwrap().contains("`title`"));
    }

    #[test]
    fn test_handle_line() {
        let store = create_test_store();
        let response = handle_line(&store, r#"{"operation": "get_context", "arguments": {"focus": "settings"}}"#);
        assert!(response.success);
        assert!(response.data.unwrap().text().contains("## Status"));

        let response = handle_line(&store, "not json");
        assert_eq!(response.error_kind, Some(ErrorKind::Protocol));
    }

    #[test]
    fn test_search_through_dispatcher() {
        let store = create_test_store();
        handle_call(
            &store,
            "create_story",
            json!({"title": "Add login", "description": "Implement OAuth login flow"}),
        );
        let response = handle_call(&store, "search", json!({"query": "login"}));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["data"]["type"], "search");
        assert_eq!(json["data"]["report"]["hits"][0]["kind"], "story");
    }
}
