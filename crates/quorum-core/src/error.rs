use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};

/// The kind of record an error refers to.
///
/// # Examples
///
/// ```
/// use quorum_core::Entity;
///
/// assert_eq!(Entity::PullRequest.to_string(), "pull request");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Team,
    User,
    PullRequest,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Team => write!(f, "team"),
            Entity::User => write!(f, "user"),
            Entity::PullRequest => write!(f, "pull request"),
        }
    }
}

/// Errors that can occur across the Quorum workspace.
///
/// The first group of variants are request rejections: the caller asked for
/// something the current state does not allow, and nothing was written. The
/// remaining variants are infrastructure failures; when one is raised inside
/// a store transaction the whole transaction is rolled back.
///
/// # Examples
///
/// ```
/// use quorum_core::{Entity, QuorumError};
///
/// let err = QuorumError::NotFound(Entity::User, "u9".into());
/// assert_eq!(err.to_string(), "user not found: u9");
/// assert_eq!(err.api_code(), "NOT_FOUND");
/// assert!(err.is_rejection());
/// ```
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum QuorumError {
    /// A team or pull request with this id already exists.
    #[error("{0} already exists: {1}")]
    #[diagnostic(code(quorum::already_exists))]
    AlreadyExists(Entity, String),

    /// The referenced user, team, or pull request does not exist.
    #[error("{0} not found: {1}")]
    #[diagnostic(code(quorum::not_found))]
    NotFound(Entity, String),

    /// A mutation was attempted on a merged pull request.
    #[error("cannot reassign on merged pull request {0}")]
    #[diagnostic(
        code(quorum::pr_merged),
        help("merged pull requests keep their reviewers; nothing can be changed")
    )]
    AlreadyMerged(String),

    /// The reviewer to replace is not assigned to the pull request.
    #[error("{reviewer} is not assigned to pull request {pr}")]
    #[diagnostic(
        code(quorum::not_assigned),
        help("run `quorum user reviews {reviewer}` to see where this user reviews")
    )]
    NotAssigned { pr: String, reviewer: String },

    /// No active replacement candidate exists in the reviewer's team.
    #[error("no active replacement candidate for {reviewer} on pull request {pr}")]
    #[diagnostic(
        code(quorum::no_candidate),
        help("activate another member of the reviewer's team and retry")
    )]
    NoCandidate { pr: String, reviewer: String },

    /// A guarded write found the record in an unexpected state.
    #[error("concurrent modification: {0}")]
    #[diagnostic(code(quorum::conflict), help("retry the operation"))]
    Conflict(String),

    /// Storage failure.
    #[error("database error: {0}")]
    #[diagnostic(code(quorum::database))]
    Database(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(quorum::config))]
    Config(String),

    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(quorum::io))]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(quorum::serialization))]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(quorum::toml))]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    #[diagnostic(code(quorum::file_not_found))]
    FileNotFound(PathBuf),
}

impl QuorumError {
    /// Stable machine-readable error code, as reported in JSON output.
    pub fn api_code(&self) -> &'static str {
        match self {
            QuorumError::AlreadyExists(Entity::Team, _) => "TEAM_EXISTS",
            QuorumError::AlreadyExists(Entity::PullRequest, _) => "PR_EXISTS",
            QuorumError::NotFound(..) => "NOT_FOUND",
            QuorumError::AlreadyMerged(_) => "PR_MERGED",
            QuorumError::NotAssigned { .. } => "NOT_ASSIGNED",
            QuorumError::NoCandidate { .. } => "NO_CANDIDATE",
            QuorumError::Conflict(_) => "CONFLICT",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Returns `true` for errors caused by the request rather than the system.
    ///
    /// # Examples
    ///
    /// ```
    /// use quorum_core::QuorumError;
    ///
    /// assert!(QuorumError::AlreadyMerged("pr-1".into()).is_rejection());
    /// assert!(!QuorumError::Database("disk full".into()).is_rejection());
    /// ```
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            QuorumError::AlreadyExists(..)
                | QuorumError::NotFound(..)
                | QuorumError::AlreadyMerged(_)
                | QuorumError::NotAssigned { .. }
                | QuorumError::NoCandidate { .. }
        )
    }
}
