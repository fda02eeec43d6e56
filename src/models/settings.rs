//! Settings Models
//!
//! Store configuration: which backend persists a project's memory and where
//! its data file lives under the project root.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Persistence engine behind a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Embedded SQLite database file
    #[default]
    Sqlite,
    /// Single structured JSON document
    Document,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Sqlite => "sqlite",
            BackendKind::Document => "document",
        }
    }

    /// Data file extension for this backend
    pub fn extension(&self) -> &'static str {
        match self {
            BackendKind::Sqlite => "sqlite",
            BackendKind::Document => "json",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(BackendKind::Sqlite),
            "document" | "json" => Ok(BackendKind::Document),
            _ => Err(format!(
                "Unknown backend: {}. Must be 'sqlite' or 'document'",
                s
            )),
        }
    }
}

/// Store configuration, read from `<project-root>/.claude/memory-config.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Persistence engine
    #[serde(default)]
    pub backend: BackendKind,
    /// Tool directory under the project root
    #[serde(default = "default_tool_dir")]
    pub tool_dir: String,
    /// Data file name without extension
    #[serde(default = "default_store_name")]
    pub store_name: String,
}

fn default_tool_dir() -> String {
    ".claude".to_string()
}

fn default_store_name() -> String {
    "project-memory".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            tool_dir: default_tool_dir(),
            store_name: default_store_name(),
        }
    }
}

impl StoreConfig {
    /// Data file name including the backend's extension
    pub fn data_file_name(&self) -> String {
        format!("{}.{}", self.store_name, self.backend.extension())
    }

    /// Same configuration on another backend
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [("tool_dir", &self.tool_dir), ("store_name", &self.store_name)] {
            if value.trim().is_empty() {
                return Err(format!("{} must not be empty", field));
            }
            if value.contains('/') || value.contains('\\') || value == ".." {
                return Err(format!(
                    "{} must be a single path component, got '{}'",
                    field, value
                ));
            }
        }
        Ok(())
    }
}
