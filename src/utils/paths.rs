//! Project Path Utilities
//!
//! Functions for resolving a project's memory files. Every path is derived
//! from an explicit project root, so two stores for two roots never collide.

use std::path::{Path, PathBuf};

use crate::models::settings::StoreConfig;
use crate::utils::error::AppResult;

/// Directory holding the optional config file, independent of the config itself
pub const CONFIG_DIR: &str = ".claude";

/// Config file name under `CONFIG_DIR`
pub const CONFIG_FILE: &str = "memory-config.json";

/// Get the config file path (<root>/.claude/memory-config.json)
pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Get the tool directory (<root>/<tool_dir>/)
pub fn tool_dir(project_root: &Path, config: &StoreConfig) -> PathBuf {
    project_root.join(&config.tool_dir)
}

/// Get the data directory (<root>/<tool_dir>/db/)
pub fn data_dir(project_root: &Path, config: &StoreConfig) -> PathBuf {
    tool_dir(project_root, config).join("db")
}

/// Get the data file path (<root>/<tool_dir>/db/<store_name>.<ext>)
pub fn data_file_path(project_root: &Path, config: &StoreConfig) -> PathBuf {
    data_dir(project_root, config).join(config.data_file_name())
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Ensure the parent directory of a file exists
pub fn ensure_parent_dir(file: &Path) -> AppResult<()> {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}
