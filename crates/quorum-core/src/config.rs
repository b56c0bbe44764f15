use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::QuorumError;

/// Top-level configuration loaded from `.quorum.toml`.
///
/// Supports layered resolution: CLI flags > config file > defaults.
///
/// # Examples
///
/// ```
/// use quorum_core::QuorumConfig;
///
/// let config = QuorumConfig::default();
/// assert_eq!(config.assignment.reviewers_per_pr, 2);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuorumConfig {
    /// Database location and connection settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Reviewer assignment settings.
    #[serde(default)]
    pub assignment: AssignmentConfig,
}

impl QuorumConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`QuorumError::FileNotFound`] if the file does not exist,
    /// [`QuorumError::Io`] if it cannot be read, [`QuorumError::Toml`] if the
    /// content is not valid TOML, or [`QuorumError::Config`] if a value is
    /// out of range.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use quorum_core::QuorumConfig;
    /// use std::path::Path;
    ///
    /// let config = QuorumConfig::from_file(Path::new(".quorum.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, QuorumError> {
        if !path.exists() {
            return Err(QuorumError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`QuorumError::Toml`] if parsing fails, or
    /// [`QuorumError::Config`] if `reviewers_per_pr` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use quorum_core::QuorumConfig;
    ///
    /// let toml = r#"
    /// [assignment]
    /// reviewers_per_pr = 3
    /// "#;
    /// let config = QuorumConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.assignment.reviewers_per_pr, 3);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, QuorumError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), QuorumError> {
        if self.assignment.reviewers_per_pr == 0 {
            return Err(QuorumError::Config(
                "assignment.reviewers_per_pr must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Where the SQLite database lives and how long writers wait for the lock.
///
/// # Examples
///
/// ```
/// use quorum_core::StoreConfig;
///
/// let config = StoreConfig::default();
/// assert_eq!(config.path.to_str(), Some(".quorum/quorum.db"));
/// assert_eq!(config.busy_timeout_ms, 5000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file path (default: `.quorum/quorum.db`).
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Milliseconds to wait for another writer before failing (default: 5000).
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".quorum/quorum.db")
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Reviewer assignment configuration.
///
/// # Examples
///
/// ```
/// use quorum_core::AssignmentConfig;
///
/// let config = AssignmentConfig::default();
/// assert_eq!(config.reviewers_per_pr, 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentConfig {
    /// Reviewers picked at creation and the target a cascade repairs towards (default: 2).
    #[serde(default = "default_reviewers_per_pr")]
    pub reviewers_per_pr: usize,
}

fn default_reviewers_per_pr() -> usize {
    2
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            reviewers_per_pr: default_reviewers_per_pr(),
        }
    }
}
