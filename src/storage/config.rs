//! JSON Configuration Management
//!
//! Reads the optional per-project store configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::models::settings::{BackendKind, StoreConfig};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{config_path, data_file_path};

/// Configuration service for one project root
#[derive(Debug, Clone)]
pub struct ConfigService {
    project_root: PathBuf,
    config_path: PathBuf,
    config: StoreConfig,
}

impl ConfigService {
    /// Load `<root>/.claude/memory-config.json`, or defaults when it is absent.
    pub fn load(project_root: &Path) -> AppResult<Self> {
        let config_path = config_path(project_root);
        let config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            StoreConfig::default()
        };

        tracing::debug!(
            "[ConfigService] {} backend for {}",
            config.backend,
            project_root.display()
        );

        Ok(Self {
            project_root: project_root.to_path_buf(),
            config_path,
            config,
        })
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> AppResult<StoreConfig> {
        let content = fs::read_to_string(path)?;
        let config: StoreConfig = serde_json::from_str(&content).map_err(|e| {
            AppError::config(format!("{} is not a valid config: {}", path.display(), e))
        })?;
        config.validate().map_err(AppError::config)?;
        Ok(config)
    }

    /// Get the current configuration
    pub fn get_config(&self) -> &StoreConfig {
        &self.config
    }

    /// Replace the backend chosen by the file, e.g. from a CLI flag
    pub fn override_backend(&mut self, backend: BackendKind) {
        self.config.backend = backend;
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Resolved data file for the current configuration
    pub fn data_file_path(&self) -> PathBuf {
        data_file_path(&self.project_root, &self.config)
    }
}
