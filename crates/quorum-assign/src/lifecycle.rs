//! Pull request lifecycle: create, merge, reassign.

use std::collections::HashSet;

use chrono::{SubsecRound, Utc};
use quorum_core::{Entity, PrStatus, PullRequest, QuorumError, Reassignment, Result};
use quorum_store::Store;
use tracing::info;

use crate::engine::ReviewEngine;
use crate::selection::{select_one, select_reviewers};

impl<S: Store> ReviewEngine<S> {
    /// Open a pull request and assign up to `reviewers_per_pr` reviewers
    /// from the author's team.
    ///
    /// An author without a team, or whose team has no other active members,
    /// gets no reviewers.
    ///
    /// # Errors
    ///
    /// [`QuorumError::AlreadyExists`] if `pr_id` is taken,
    /// [`QuorumError::NotFound`] if the author is unknown.
    pub fn create_pr(&self, pr_id: &str, name: &str, author_id: &str) -> Result<PullRequest> {
        let pr = self.store.transaction(|tx| {
            if tx.pr_exists(pr_id)? {
                return Err(QuorumError::AlreadyExists(
                    Entity::PullRequest,
                    pr_id.to_string(),
                ));
            }
            let author = tx
                .get_user(author_id)?
                .ok_or_else(|| QuorumError::NotFound(Entity::User, author_id.to_string()))?;

            let pool = match &author.team_name {
                Some(team) => tx.active_team_members(team, &author.user_id)?,
                None => Vec::new(),
            };
            let exclude = HashSet::from([author.user_id.clone()]);
            let reviewers = self.draw(|rng| {
                select_reviewers(rng, &pool, self.config.reviewers_per_pr, &exclude)
            });

            let pr = PullRequest {
                pull_request_id: pr_id.to_string(),
                pull_request_name: name.to_string(),
                author_id: author.user_id,
                status: PrStatus::Open,
                assigned_reviewers: reviewers,
                // Stored timestamps carry microseconds.
                created_at: Utc::now().trunc_subsecs(6),
                merged_at: None,
            };
            tx.create_pr(&pr)?;
            Ok(pr)
        })?;

        info!(
            pr = %pr.pull_request_id,
            reviewers = ?pr.assigned_reviewers,
            "pull request created"
        );
        Ok(pr)
    }

    /// Mark a pull request merged. Merging twice returns the same state.
    ///
    /// # Errors
    ///
    /// [`QuorumError::NotFound`] if the pull request does not exist.
    pub fn merge_pr(&self, pr_id: &str) -> Result<PullRequest> {
        let pr = self.store.transaction(|tx| {
            let current = tx
                .get_pr(pr_id)?
                .ok_or_else(|| QuorumError::NotFound(Entity::PullRequest, pr_id.to_string()))?;
            if current.is_merged() {
                return Ok(current);
            }
            tx.merge_pr(pr_id, Utc::now())
        })?;

        info!(pr = %pr.pull_request_id, "pull request merged");
        Ok(pr)
    }

    /// Replace `old_reviewer_id` on an open pull request with a random
    /// active member of the old reviewer's team.
    ///
    /// The author and every reviewer currently on the pull request are
    /// excluded. The replacement takes the old reviewer's position.
    ///
    /// # Errors
    ///
    /// - [`QuorumError::NotFound`] if the pull request or the old reviewer is unknown
    /// - [`QuorumError::AlreadyMerged`] if the pull request is merged
    /// - [`QuorumError::NotAssigned`] if the old reviewer is not on the pull request
    /// - [`QuorumError::NoCandidate`] if nobody is left to pick
    pub fn reassign_reviewer(&self, pr_id: &str, old_reviewer_id: &str) -> Result<Reassignment> {
        let reassignment = self.store.transaction(|tx| {
            let pr = tx
                .get_pr(pr_id)?
                .ok_or_else(|| QuorumError::NotFound(Entity::PullRequest, pr_id.to_string()))?;
            let old = tx.get_user(old_reviewer_id)?.ok_or_else(|| {
                QuorumError::NotFound(Entity::User, old_reviewer_id.to_string())
            })?;

            if pr.is_merged() {
                return Err(QuorumError::AlreadyMerged(pr_id.to_string()));
            }
            if !pr.has_reviewer(old_reviewer_id) {
                return Err(QuorumError::NotAssigned {
                    pr: pr_id.to_string(),
                    reviewer: old_reviewer_id.to_string(),
                });
            }

            let pool = match &old.team_name {
                Some(team) => tx.active_team_members(team, old_reviewer_id)?,
                None => Vec::new(),
            };
            let mut exclude: HashSet<String> = pr.assigned_reviewers.iter().cloned().collect();
            exclude.insert(pr.author_id.clone());

            let replacement = self
                .draw(|rng| select_one(rng, &pool, &exclude))
                .ok_or_else(|| QuorumError::NoCandidate {
                    pr: pr_id.to_string(),
                    reviewer: old_reviewer_id.to_string(),
                })?;

            tx.reassign_reviewer(pr_id, old_reviewer_id, &replacement)?;
            let pr = tx
                .get_pr(pr_id)?
                .ok_or_else(|| QuorumError::NotFound(Entity::PullRequest, pr_id.to_string()))?;
            Ok(Reassignment {
                pr,
                replaced_by: replacement,
            })
        })?;

        info!(
            pr = %reassignment.pr.pull_request_id,
            old = old_reviewer_id,
            new = %reassignment.replaced_by,
            "reviewer reassigned"
        );
        Ok(reassignment)
    }
}

#[cfg(test)]
mod tests {
    use quorum_core::{AssignmentConfig, QuorumError, Team, TeamMember};
    use quorum_store::SqliteStore;

    use crate::ReviewEngine;

    fn member(id: &str, active: bool) -> TeamMember {
        TeamMember {
            user_id: id.into(),
            username: id.to_uppercase(),
            is_active: active,
        }
    }

    fn engine(seed: u64) -> ReviewEngine<SqliteStore> {
        let engine = ReviewEngine::with_seed(
            SqliteStore::in_memory().unwrap(),
            AssignmentConfig::default(),
            seed,
        );
        engine
            .add_team(Team {
                team_name: "backend".into(),
                members: vec![
                    member("u1", true),
                    member("u2", true),
                    member("u3", true),
                    member("u4", true),
                    member("u5", false),
                ],
            })
            .unwrap();
        engine
    }

    #[test]
    fn create_assigns_two_active_teammates() {
        for seed in 0..20 {
            let engine = engine(seed);
            let pr = engine.create_pr("pr-1", "Add cache", "u1").unwrap();
            assert_eq!(pr.assigned_reviewers.len(), 2);
            assert!(!pr.has_reviewer("u1"));
            assert!(!pr.has_reviewer("u5"));
        }
    }

    #[test]
    fn create_rejects_duplicates_and_unknown_authors() {
        let engine = engine(0);
        engine.create_pr("pr-1", "Add cache", "u1").unwrap();
        let dup = engine.create_pr("pr-1", "Again", "u2").unwrap_err();
        assert_eq!(dup.api_code(), "PR_EXISTS");
        let ghost = engine.create_pr("pr-2", "Ghost", "nobody").unwrap_err();
        assert_eq!(ghost.api_code(), "NOT_FOUND");
    }

    #[test]
    fn merge_is_idempotent() {
        let engine = engine(0);
        engine.create_pr("pr-1", "Add cache", "u1").unwrap();
        let first = engine.merge_pr("pr-1").unwrap();
        let second = engine.merge_pr("pr-1").unwrap();
        assert_eq!(first, second);
        assert!(first.merged_at.is_some());
        assert!(matches!(
            engine.merge_pr("pr-x"),
            Err(QuorumError::NotFound(..))
        ));
    }

    #[test]
    fn reassign_swaps_in_place() {
        let engine = engine(3);
        let pr = engine.create_pr("pr-1", "Add cache", "u1").unwrap();
        let old = pr.assigned_reviewers[0].clone();
        let kept = pr.assigned_reviewers[1].clone();

        let result = engine.reassign_reviewer("pr-1", &old).unwrap();
        assert_ne!(result.replaced_by, old);
        assert_ne!(result.replaced_by, kept);
        assert_ne!(result.replaced_by, "u1");
        assert_ne!(result.replaced_by, "u5");
        assert_eq!(result.pr.assigned_reviewers, [result.replaced_by.clone(), kept]);
    }

    #[test]
    fn reassign_error_cases() {
        let engine = engine(0);
        let pr = engine.create_pr("pr-1", "Add cache", "u1").unwrap();
        let reviewer = pr.assigned_reviewers[0].clone();

        let err = engine.reassign_reviewer("pr-x", &reviewer).unwrap_err();
        assert!(matches!(err, QuorumError::NotFound(..)));
        let err = engine.reassign_reviewer("pr-1", "nobody").unwrap_err();
        assert!(matches!(err, QuorumError::NotFound(..)));
        let err = engine.reassign_reviewer("pr-1", "u1").unwrap_err();
        assert_eq!(err.api_code(), "NOT_ASSIGNED");

        engine.merge_pr("pr-1").unwrap();
        let err = engine.reassign_reviewer("pr-1", &reviewer).unwrap_err();
        assert_eq!(err.api_code(), "PR_MERGED");
        let after = engine.merge_pr("pr-1").unwrap();
        assert_eq!(after.assigned_reviewers, pr.assigned_reviewers);
    }

    #[test]
    fn reassign_without_candidates_fails_cleanly() {
        let engine = ReviewEngine::with_seed(
            SqliteStore::in_memory().unwrap(),
            AssignmentConfig::default(),
            0,
        );
        engine
            .add_team(Team {
                team_name: "tiny".into(),
                members: vec![member("a", true), member("b", true), member("c", true)],
            })
            .unwrap();
        let pr = engine.create_pr("pr-1", "Tiny", "a").unwrap();
        let err = engine.reassign_reviewer("pr-1", "b").unwrap_err();
        assert_eq!(err.api_code(), "NO_CANDIDATE");
        let unchanged = engine.merge_pr("pr-1").unwrap();
        assert_eq!(unchanged.assigned_reviewers, pr.assigned_reviewers);
    }
}
