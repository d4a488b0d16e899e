//! Configuration module for CloudSaves.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for CloudSaves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub filters: FiltersConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Local directory holding the save files.
    pub saves_dir: PathBuf,
    /// Remote folder the saves are mirrored to. A trailing `/` is ignored.
    pub remote_dir: String,
    /// File recording the last successful sync date and used space.
    pub status_file: PathBuf,
}

/// Extra exclusion rules on top of the built-in name checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FiltersConfig {
    /// Glob patterns; matching file names are never synced.
    pub exclude: Vec<String>,
}

/// Folder-backed storage provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory that plays the role of the remote storage root.
    pub root: PathBuf,
    /// Accept uploads as byte streams instead of local paths.
    pub stream_uploads: bool,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON-formatted log lines.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/cloudsaves/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("cloudsaves")
            .join("config.yaml")
    }
}

impl SyncConfig {
    /// Remote folder with any trailing `/` removed.
    pub fn normalized_remote_dir(&self) -> &str {
        let trimmed = self.remote_dir.trim_end_matches('/');
        if trimmed.is_empty() && !self.remote_dir.is_empty() {
            "/"
        } else {
            trimmed
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("cloudsaves")
}

impl Default for SyncConfig {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            saves_dir: data_dir.join("saves"),
            remote_dir: "/cloudsaves/saves/".to_string(),
            status_file: data_dir.join("status.yaml"),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("CloudSaves"),
            stream_uploads: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.remote_dir"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.remote_dir.trim().is_empty() {
            errors.push(ValidationError {
                field: "sync.remote_dir".into(),
                message: "must not be empty".into(),
            });
        } else if !self.sync.remote_dir.starts_with('/') {
            errors.push(ValidationError {
                field: "sync.remote_dir".into(),
                message: format!("must be an absolute path: {}", self.sync.remote_dir),
            });
        }
        if self.sync.saves_dir.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "sync.saves_dir".into(),
                message: "must not be empty".into(),
            });
        }
        if self.sync.status_file.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "sync.status_file".into(),
                message: "must not be empty".into(),
            });
        }

        // --- filters ---
        for (i, pattern) in self.filters.exclude.iter().enumerate() {
            if let Err(e) = glob::Pattern::new(pattern) {
                errors.push(ValidationError {
                    field: format!("filters.exclude[{i}]"),
                    message: format!("invalid glob pattern '{pattern}': {e}"),
                });
            }
        }

        // --- storage ---
        if self.storage.root.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.root".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use cloudsaves_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .saves_dir(PathBuf::from("/home/user/.local/share/game/saves"))
///     .remote_dir("/game/saves")
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn saves_dir(mut self, dir: PathBuf) -> Self {
        self.config.sync.saves_dir = dir;
        self
    }

    pub fn remote_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.sync.remote_dir = dir.into();
        self
    }

    pub fn status_file(mut self, file: PathBuf) -> Self {
        self.config.sync.status_file = file;
        self
    }

    // --- filters ---

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.config.filters.exclude.push(pattern.into());
        self
    }

    // --- storage ---

    pub fn storage_root(mut self, root: PathBuf) -> Self {
        self.config.storage.root = root;
        self
    }

    pub fn stream_uploads(mut self, enabled: bool) -> Self {
        self.config.storage.stream_uploads = enabled;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
