//! Request Types
//!
//! One tagged variant per operation, each carrying its typed arguments.
//! Incoming calls name an operation and supply a JSON argument object;
//! `MemoryRequest::parse` turns that pair into a variant before dispatch.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use project_memory_core::text::{normalize_list, split_csv};
use project_memory_core::{DefectStatus, EntityId, EntityKind, StoryStatus, TaskStatus};

use crate::services::memory::store::{
    ArchitectureInput, DeploymentInput, NewDefect, NewKnowledge, NewLesson, NewStory, NewTask,
    SettingInput,
};
use crate::utils::error::{AppError, AppResult};

/// Every operation name the dispatcher accepts
pub const OPERATIONS: [&str; 16] = [
    "learn_setting",
    "learn_architecture",
    "learn_deployment",
    "mark_deployed",
    "create_story",
    "create_task",
    "log_defect",
    "record_lesson",
    "add_knowledge",
    "update_story_status",
    "update_task_status",
    "update_defect_status",
    "get_setting",
    "get_record",
    "get_context",
    "search",
];

/// A single call as it arrives on the wire: `{"operation": ..., "arguments": {...}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEnvelope {
    pub operation: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkDeployedArgs {
    #[serde(default)]
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoryStatusArgs {
    pub id: EntityId,
    pub status: StoryStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatusArgs {
    pub id: EntityId,
    pub status: TaskStatus,
    pub implementation_notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefectStatusArgs {
    pub id: EntityId,
    pub status: DefectStatus,
    pub fix_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetSettingArgs {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetRecordArgs {
    pub kind: EntityKind,
    pub id: EntityId,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextArgs {
    pub focus: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchArgs {
    #[serde(default)]
    pub query: String,
    pub category: Option<String>,
}

/// A validated call, ready to run against a store
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", content = "arguments", rename_all = "snake_case")]
pub enum MemoryRequest {
    LearnSetting(SettingInput),
    LearnArchitecture(ArchitectureInput),
    LearnDeployment(DeploymentInput),
    MarkDeployed(MarkDeployedArgs),
    CreateStory(NewStory),
    CreateTask(NewTask),
    LogDefect(NewDefect),
    RecordLesson(NewLesson),
    AddKnowledge(NewKnowledge),
    UpdateStoryStatus(StoryStatusArgs),
    UpdateTaskStatus(TaskStatusArgs),
    UpdateDefectStatus(DefectStatusArgs),
    GetSetting(GetSettingArgs),
    GetRecord(GetRecordArgs),
    GetContext(ContextArgs),
    Search(SearchArgs),
}

impl MemoryRequest {
    /// Decode `arguments` for `operation`.
    ///
    /// An unknown operation is a protocol error; arguments that do not fit the
    /// operation's parameters are a validation error.
    pub fn parse(operation: &str, arguments: Value) -> AppResult<Self> {
        let operation = operation.trim();
        if !OPERATIONS.contains(&operation) {
            return Err(AppError::protocol(format!(
                "Unknown operation: {}",
                operation
            )));
        }

        let arguments = match arguments {
            Value::Null => Value::Object(serde_json::Map::new()),
            Value::Object(_) => arguments,
            other => {
                return Err(AppError::validation(format!(
                    "Arguments for {} must be a JSON object, got {}",
                    operation, other
                )))
            }
        };

        let envelope = serde_json::json!({ "operation": operation, "arguments": arguments });
        serde_json::from_value(envelope).map_err(|e| {
            AppError::validation(format!("Invalid arguments for {}: {}", operation, e))
        })
    }

    /// Wire name of the operation
    pub fn operation(&self) -> &'static str {
        match self {
            MemoryRequest::LearnSetting(_) => "learn_setting",
            MemoryRequest::LearnArchitecture(_) => "learn_architecture",
            MemoryRequest::LearnDeployment(_) => "learn_deployment",
            MemoryRequest::MarkDeployed(_) => "mark_deployed",
            MemoryRequest::CreateStory(_) => "create_story",
            MemoryRequest::CreateTask(_) => "create_task",
            MemoryRequest::LogDefect(_) => "log_defect",
            MemoryRequest::RecordLesson(_) => "record_lesson",
            MemoryRequest::AddKnowledge(_) => "add_knowledge",
            MemoryRequest::UpdateStoryStatus(_) => "update_story_status",
            MemoryRequest::UpdateTaskStatus(_) => "update_task_status",
            MemoryRequest::UpdateDefectStatus(_) => "update_defect_status",
            MemoryRequest::GetSetting(_) => "get_setting",
            MemoryRequest::GetRecord(_) => "get_record",
            MemoryRequest::GetContext(_) => "get_context",
            MemoryRequest::Search(_) => "search",
        }
    }
}

/// Deserialize a list argument given either as a JSON array of strings or as
/// one comma-separated string. Entries are trimmed and empty ones dropped.
pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrCsv {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match Option::<ListOrCsv>::deserialize(deserializer)? {
        Some(ListOrCsv::List(items)) => normalize_list(items),
        Some(ListOrCsv::Csv(raw)) => split_csv(&raw),
        None => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_operations_match_variants() {
        for operation in OPERATIONS {
            let arguments = match operation {
                "update_story_status" => json!({"id": 1, "status": "completed"}),
                "update_task_status" => json!({"id": 1, "status": "in_progress"}),
                "update_defect_status" => json!({"id": 1, "status": "in_progress"}),
                "get_record" => json!({"kind": "story", "id": 1}),
                _ => json!({}),
            };
            let request = MemoryRequest::parse(operation, arguments).unwrap();
            assert_eq!(request.operation(), operation);
        }
    }

    #[test]
    fn test_unknown_operation_is_protocol_error() {
        let err = MemoryRequest::parse("drop_tables", json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_bad_arguments_are_validation_errors() {
        let err = MemoryRequest::parse("create_story", json!({"priority": "high"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = MemoryRequest::parse("update_story_status", json!({"id": 1, "status": "paused"}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = MemoryRequest::parse("search", json!(["login"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_missing_arguments_default_to_empty() {
        match MemoryRequest::parse("get_context", Value::Null).unwrap() {
            MemoryRequest::GetContext(args) => assert!(args.focus.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_list_arguments_accept_csv_or_array() {
        let request = MemoryRequest::parse(
            "add_knowledge",
            json!({"title": "t", "content": "c", "tags": "session, claude-code,,"}),
        )
        .unwrap();
        match request {
            MemoryRequest::AddKnowledge(input) => {
                assert_eq!(input.tags, vec!["session", "claude-code"])
            }
            other => panic!("unexpected {:?}", other),
        }

        let request = MemoryRequest::parse(
            "learn_architecture",
            json!({"component": "api", "description": "d", "tech_stack": ["rust", " axum "]}),
        )
        .unwrap();
        match request {
            MemoryRequest::LearnArchitecture(input) => {
                assert_eq!(input.tech_stack, vec!["rust", "axum"])
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_deployment_aliases() {
        let request = MemoryRequest::parse(
            "learn_deployment",
            json!({
                "environment": "discovered",
                "deployment_steps": "git push",
                "test_verification": "Verify deployment manually",
                "rollback_procedure": "git revert"
            }),
        )
        .unwrap();
        match request {
            MemoryRequest::LearnDeployment(input) => {
                assert_eq!(input.steps, "git push");
                assert_eq!(input.verification.as_deref(), Some("Verify deployment manually"));
                assert_eq!(input.rollback.as_deref(), Some("git revert"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_call_envelope_without_arguments() {
        let envelope: CallEnvelope = serde_json::from_str(r#"{"operation": "get_context"}"#).unwrap();
        assert_eq!(envelope.operation, "get_context");
        assert!(envelope.arguments.is_null());
    }
}
