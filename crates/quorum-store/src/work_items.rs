use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use quorum_core::{PullRequest, PullRequestShort, Result, Stats};

/// Pull requests and reviewer links.
///
/// Reviewer lists are returned in assignment order. A reassigned reviewer
/// keeps the slot of the reviewer it replaced.
pub trait WorkItemStore {
    fn pr_exists(&self, pr_id: &str) -> Result<bool>;

    fn get_pr(&self, pr_id: &str) -> Result<Option<PullRequest>>;

    /// Insert the pull request row together with its reviewer links.
    fn create_pr(&self, pr: &PullRequest) -> Result<()>;

    /// Mark the pull request merged if it is still open.
    ///
    /// The update is conditional on the current status, so a pull request
    /// that is already merged keeps its original `merged_at`. Returns the
    /// stored state after the update.
    ///
    /// # Errors
    ///
    /// [`QuorumError::NotFound`](quorum_core::QuorumError::NotFound) if the
    /// pull request does not exist.
    fn merge_pr(&self, pr_id: &str, merged_at: DateTime<Utc>) -> Result<PullRequest>;

    /// Replace `old_reviewer_id` with `new_reviewer_id` on an open pull request.
    ///
    /// # Errors
    ///
    /// [`QuorumError::Conflict`](quorum_core::QuorumError::Conflict) if the
    /// pull request is no longer open or the old link no longer exists.
    fn reassign_reviewer(&self, pr_id: &str, old_reviewer_id: &str, new_reviewer_id: &str)
        -> Result<()>;

    /// Ids of open pull requests with at least one reviewer in `user_ids`, sorted.
    fn open_prs_with_reviewers_in(&self, user_ids: &[String]) -> Result<Vec<String>>;

    /// Delete every reviewer link to `user_ids` on open pull requests.
    ///
    /// Links on merged pull requests are left alone. Returns the number of
    /// links removed.
    fn remove_reviewers_in(&self, user_ids: &[String]) -> Result<usize>;

    /// Load the given pull requests with their current reviewers.
    ///
    /// Unknown ids are absent from the map.
    fn prs_with_reviewers(&self, pr_ids: &[String]) -> Result<BTreeMap<String, PullRequest>>;

    /// Insert `(pull_request_id, user_id)` reviewer links.
    fn bulk_add_reviewers(&self, links: &[(String, String)]) -> Result<()>;

    /// Pull requests on which `user_id` is an assigned reviewer, newest first.
    fn prs_reviewed_by(&self, user_id: &str) -> Result<Vec<PullRequestShort>>;

    /// Aggregate counts over all pull requests and reviewer links.
    fn stats(&self) -> Result<Stats>;
}
