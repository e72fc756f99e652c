// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for Shoebox
//!
//! The application config file belongs to the front-end. The core only sees
//! the [`ImportOptions`] resolved from it.

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::import::ImportOptions;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    /// Which library to open
    #[serde(default)]
    pub library: LibraryConfig,

    /// Import behavior
    #[serde(default)]
    pub import: ImportOptions,

    /// Presentation settings
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LibraryConfig {
    /// Library opened when none is given on the command line
    #[serde(default)]
    pub default_root: Option<PathBuf>,

    /// Recently opened libraries, most recent first
    #[serde(default)]
    pub recent: Vec<PathBuf>,

    #[serde(default = "default_max_recent")]
    pub max_recent: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct UiConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// chrono format string for capture dates
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

// Default value functions
fn default_max_recent() -> usize {
    10
}

fn default_page_size() -> usize {
    50
}

fn default_date_format() -> String {
    "%Y-%m-%d %H:%M".to_string()
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            default_root: None,
            recent: Vec::new(),
            max_recent: default_max_recent(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            date_format: default_date_format(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::ShoeboxError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Import options for the core
    pub fn import_options(&self) -> ImportOptions {
        self.import.clone()
    }

    /// Library to use: explicit choice, else the configured default
    pub fn resolve_library(&self, explicit: Option<&Path>) -> Option<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.library.default_root.clone())
    }

    /// Move `root` to the front of the recent list
    pub fn remember_library(&mut self, root: &Path) {
        self.library.recent.retain(|p| p != root);
        self.library.recent.insert(0, root.to_path_buf());
        self.library.recent.truncate(self.library.max_recent.max(1));
    }

    /// Problems that would make the configuration unusable
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.import.workers == 0 {
            problems.push("import.workers must be at least 1".to_string());
        }
        if !(16..=4096).contains(&self.import.thumbnail_size) {
            problems.push(format!(
                "import.thumbnail_size {} is outside 16..=4096",
                self.import.thumbnail_size
            ));
        }
        if self.ui.page_size == 0 {
            problems.push("ui.page_size must be at least 1".to_string());
        }
        if StrftimeItems::new(&self.ui.date_format).any(|item| matches!(item, Item::Error)) {
            problems.push(format!("ui.date_format {:?} is not a valid format", self.ui.date_format));
        }
        problems
    }
}

/// Default config file location
pub fn default_config_path() -> PathBuf {
    std::env::var_os("SHOEBOX_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("shoebox.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::DeletedContentPolicy;
    use crate::organizer::TransferMode;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "import": { "transfer_mode": "move", "deleted_content_policy": "skip" },
                 "library": { "default_root": "/photos" } }"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        let options = config.import_options();
        assert_eq!(options.transfer_mode, TransferMode::Move);
        assert_eq!(options.deleted_content_policy, DeletedContentPolicy::Skip);
        assert!(options.generate_thumbnails);
        assert_eq!(config.ui.page_size, 50);
        assert_eq!(config.resolve_library(None), Some(PathBuf::from("/photos")));
        assert_eq!(
            config.resolve_library(Some(Path::new("/elsewhere"))),
            Some(PathBuf::from("/elsewhere"))
        );
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(crate::ShoeboxError::Config(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.json");
        let mut config = AppConfig::default();
        config.remember_library(Path::new("/a"));
        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_recent_list_is_bounded_and_deduplicated() {
        let mut config = AppConfig::default();
        config.library.max_recent = 2;
        config.remember_library(Path::new("/a"));
        config.remember_library(Path::new("/b"));
        config.remember_library(Path::new("/a"));
        config.remember_library(Path::new("/c"));
        assert_eq!(config.library.recent, vec![PathBuf::from("/c"), PathBuf::from("/a")]);
    }

    #[test]
    fn test_validate_reports_bad_values() {
        let mut config = AppConfig::default();
        config.import.workers = 0;
        config.import.thumbnail_size = 1;
        config.ui.date_format = "%Q".to_string();
        assert_eq!(config.validate().len(), 3);
    }
}
