use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A person who can author pull requests and review them.
///
/// # Examples
///
/// ```
/// use quorum_core::User;
///
/// let user = User {
///     user_id: "u1".into(),
///     username: "Alice".into(),
///     team_name: Some("backend".into()),
///     is_active: true,
/// };
/// assert!(user.is_active);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user id.
    pub user_id: String,
    /// Display name.
    pub username: String,
    /// Team this user belongs to, if any.
    pub team_name: Option<String>,
    /// Inactive users are never picked as reviewers.
    pub is_active: bool,
}

/// A user as listed inside a [`Team`] payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl TeamMember {
    /// Attach this member to `team_name`, producing the stored user row.
    pub fn into_user(self, team_name: &str) -> User {
        User {
            user_id: self.user_id,
            username: self.username,
            team_name: Some(team_name.to_string()),
            is_active: self.is_active,
        }
    }
}

impl From<User> for TeamMember {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username,
            is_active: user.is_active,
        }
    }
}

/// A named group of users. Teams own no pull requests directly.
///
/// # Examples
///
/// ```
/// use quorum_core::Team;
///
/// let json = r#"{
///     "team_name": "backend",
///     "members": [
///         {"user_id": "u1", "username": "Alice", "is_active": true},
///         {"user_id": "u2", "username": "Bob"}
///     ]
/// }"#;
/// let team: Team = serde_json::from_str(json).unwrap();
/// assert_eq!(team.members.len(), 2);
/// assert!(team.members[1].is_active);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_name: String,
    #[serde(default)]
    pub members: Vec<TeamMember>,
}

/// Pull request status. `Merged` is terminal.
///
/// # Examples
///
/// ```
/// use quorum_core::PrStatus;
///
/// let s: PrStatus = serde_json::from_str("\"MERGED\"").unwrap();
/// assert_eq!(s, PrStatus::Merged);
/// assert_eq!(PrStatus::Open.to_string(), "OPEN");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrStatus {
    Open,
    Merged,
}

impl PrStatus {
    /// The value stored in the `status` column.
    pub fn as_str(self) -> &'static str {
        match self {
            PrStatus::Open => "OPEN",
            PrStatus::Merged => "MERGED",
        }
    }
}

impl fmt::Display for PrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OPEN" => Ok(PrStatus::Open),
            "MERGED" => Ok(PrStatus::Merged),
            other => Err(format!("unknown pull request status: {other}")),
        }
    }
}

/// A pull request and its assigned reviewers.
///
/// `assigned_reviewers` never contains `author_id`, never contains the same
/// id twice, and is frozen once the status is [`PrStatus::Merged`].
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use quorum_core::{PrStatus, PullRequest};
///
/// let pr = PullRequest {
///     pull_request_id: "pr-1".into(),
///     pull_request_name: "Fix login".into(),
///     author_id: "u1".into(),
///     status: PrStatus::Open,
///     assigned_reviewers: vec!["u2".into()],
///     created_at: Utc::now(),
///     merged_at: None,
/// };
/// assert!(pr.has_reviewer("u2"));
/// assert!(!pr.is_merged());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PrStatus,
    pub assigned_reviewers: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    /// Returns `true` once the pull request has been merged.
    pub fn is_merged(&self) -> bool {
        self.status == PrStatus::Merged
    }

    /// Returns `true` if `user_id` is currently an assigned reviewer.
    pub fn has_reviewer(&self, user_id: &str) -> bool {
        self.assigned_reviewers.iter().any(|r| r == user_id)
    }
}

/// Summary view of a pull request, used when listing a user's reviews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestShort {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PrStatus,
}

/// Outcome of a reviewer reassignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reassignment {
    /// The pull request after the swap.
    pub pr: PullRequest,
    /// Id of the reviewer who replaced the old one.
    pub replaced_by: String,
}

/// Outcome of a team deactivation.
///
/// # Examples
///
/// ```
/// use quorum_core::DeactivationReport;
///
/// let report = DeactivationReport::default();
/// assert_eq!(report.deactivated_users_count, 0);
/// assert_eq!(report.affected_prs_count, 0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivationReport {
    /// Members flipped from active to inactive.
    pub deactivated_users_count: usize,
    /// Open pull requests that lost at least one reviewer, whether or not a
    /// replacement was found.
    pub affected_prs_count: usize,
}

/// Aggregate assignment statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_prs: usize,
    pub open_prs: usize,
    pub merged_prs: usize,
    /// Users with at least one assignment, busiest first.
    pub reviewer_stats: Vec<ReviewerStat>,
    /// Every pull request, newest first.
    pub pr_stats: Vec<PrStat>,
}

/// Per-reviewer assignment counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerStat {
    pub user_id: String,
    pub username: String,
    pub total_assigned: usize,
    pub open_assigned: usize,
    pub merged_assigned: usize,
}

/// Per-pull-request reviewer count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrStat {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub status: PrStatus,
    pub reviewers_count: usize,
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use quorum_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON with snake_case keys.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
