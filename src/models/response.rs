//! Response Types
//!
//! The envelope every dispatched call returns, and the payloads it carries.

use serde::{Deserialize, Serialize};

use project_memory_core::{EntityId, EntityKind, Record};

use crate::services::memory::context::ContextReport;
use crate::services::memory::search::SearchReport;
use crate::utils::error::{AppError, ErrorKind};

/// Generic command response for every operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl<T> CommandResponse<T> {
    /// Create a successful response with data
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
        }
    }

    /// Create an error response with message
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_kind: None,
        }
    }

    /// Create an error response classified by the error's kind
    pub fn from_error(error: &AppError) -> Self {
        Self {
            error_kind: Some(error.kind()),
            ..Self::err(error.to_string())
        }
    }
}

impl<T> From<Result<T, AppError>> for CommandResponse<T> {
    fn from(result: Result<T, AppError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::from_error(&e),
        }
    }
}

/// Whether a write inserted a new row or replaced/changed an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAction {
    Created,
    Updated,
}

/// Confirmation payload returned by every successful write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteConfirmation {
    pub kind: EntityKind,
    pub id: EntityId,
    /// Natural key for upserted kinds, e.g. `test.command`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub action: WriteAction,
    /// One-line human-readable summary for the caller's user
    pub summary: String,
}

/// Payload of a dispatched operation
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryResponse {
    Write(WriteConfirmation),
    Record { record: Record },
    Context { text: String, report: ContextReport },
    Search { text: String, report: SearchReport },
}

impl MemoryResponse {
    /// Human-readable rendering of the payload
    pub fn text(&self) -> String {
        match self {
            MemoryResponse::Write(confirmation) => confirmation.summary.clone(),
            MemoryResponse::Record { record } => {
                serde_json::to_string_pretty(record).unwrap_or_else(|_| format!("{:?}", record))
            }
            MemoryResponse::Context { text, .. } | MemoryResponse::Search { text, .. } => {
                text.clone()
            }
        }
    }
}

impl From<WriteConfirmation> for MemoryResponse {
    fn from(confirmation: WriteConfirmation) -> Self {
        MemoryResponse::Write(confirmation)
    }
}

impl From<ContextReport> for MemoryResponse {
    fn from(report: ContextReport) -> Self {
        MemoryResponse::Context {
            text: report.to_string(),
            report,
        }
    }
}

impl From<SearchReport> for MemoryResponse {
    fn from(report: SearchReport) -> Self {
        MemoryResponse::Search {
            text: report.to_string(),
            report,
        }
    }
}
