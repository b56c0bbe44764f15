//! Core types, configuration, and error handling for Quorum.
//!
//! This crate provides the shared foundation used by the other Quorum crates:
//! - [`QuorumError`]: unified error type using `thiserror`
//! - [`QuorumConfig`]: configuration loaded from `.quorum.toml`
//! - Domain types: [`User`], [`Team`], [`PullRequest`], [`PrStatus`],
//!   [`DeactivationReport`], [`Stats`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{AssignmentConfig, QuorumConfig, StoreConfig};
pub use error::{Entity, QuorumError};
pub use types::{
    DeactivationReport, OutputFormat, PrStat, PrStatus, PullRequest, PullRequestShort,
    Reassignment, ReviewerStat, Stats, Team, TeamMember, User,
};

/// A convenience `Result` type for Quorum operations.
pub type Result<T> = std::result::Result<T, QuorumError>;
