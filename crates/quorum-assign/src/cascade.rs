//! Team deactivation and reviewer repair.
//!
//! Deactivating a team strips its members from every open pull request and
//! tops each affected pull request back up from the remaining active users.
//! The whole cascade is one transaction: either every member is deactivated
//! and every pull request repaired, or nothing changes.
//!
//! A pull request that cannot be brought back to the target reviewer count
//! keeps whatever reviewers it has. That is a valid outcome, not an error.

use std::collections::HashSet;

use quorum_core::{DeactivationReport, Entity, PullRequest, QuorumError, Result, User};
use quorum_store::{Store, UnitOfWork};
use rand::Rng;
use tracing::{debug, info};

use crate::engine::ReviewEngine;
use crate::selection::select_reviewers;

/// The outcome of repairing one pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrRepair {
    /// Full reviewer list after repair: survivors first, then replacements.
    pub reviewers: Vec<String>,
    /// Newly chosen reviewers only.
    pub replacements: Vec<String>,
}

impl PrRepair {
    /// Returns `true` if the repaired list is still short of `target`.
    pub fn is_under_reviewed(&self, target: usize) -> bool {
        self.reviewers.len() < target
    }
}

/// Top `pr` up to `target` reviewers from `pool`.
///
/// The author and the reviewers still on the pull request are excluded.
/// Pull requests that already have `target` or more reviewers come back
/// unchanged.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use quorum_assign::repair_pr;
/// use quorum_core::{PrStatus, PullRequest, User};
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let pr = PullRequest {
///     pull_request_id: "pr-1".into(),
///     pull_request_name: "Add cache".into(),
///     author_id: "u1".into(),
///     status: PrStatus::Open,
///     assigned_reviewers: vec!["u2".into()],
///     created_at: Utc::now(),
///     merged_at: None,
/// };
/// let pool = vec![User {
///     user_id: "u9".into(),
///     username: "Zed".into(),
///     team_name: Some("platform".into()),
///     is_active: true,
/// }];
///
/// let repair = repair_pr(&mut StdRng::seed_from_u64(0), &pr, &pool, 2);
/// assert_eq!(repair.reviewers, ["u2", "u9"]);
/// assert_eq!(repair.replacements, ["u9"]);
/// ```
pub fn repair_pr<R: Rng + ?Sized>(
    rng: &mut R,
    pr: &PullRequest,
    pool: &[User],
    target: usize,
) -> PrRepair {
    let needed = target.saturating_sub(pr.assigned_reviewers.len());
    let replacements = if needed == 0 {
        Vec::new()
    } else {
        let mut exclude: HashSet<String> = pr.assigned_reviewers.iter().cloned().collect();
        exclude.insert(pr.author_id.clone());
        select_reviewers(rng, pool, needed, &exclude)
    };

    let mut reviewers = pr.assigned_reviewers.clone();
    reviewers.extend(replacements.iter().cloned());
    PrRepair {
        reviewers,
        replacements,
    }
}

impl<S: Store> ReviewEngine<S> {
    /// Deactivate every active member of `team_name` and repair the open
    /// pull requests they were reviewing.
    ///
    /// Members that were already inactive are not counted. Merged pull
    /// requests keep their reviewers.
    ///
    /// # Errors
    ///
    /// [`QuorumError::NotFound`] if the team does not exist. Any store
    /// failure rolls the whole cascade back.
    pub fn deactivate_team(&self, team_name: &str) -> Result<DeactivationReport> {
        let report = self.store.transaction(|tx| {
            if !tx.team_exists(team_name)? {
                return Err(QuorumError::NotFound(Entity::Team, team_name.to_string()));
            }

            let deactivated = tx.deactivate_team_users(team_name)?;
            if deactivated.is_empty() {
                return Ok(DeactivationReport::default());
            }

            let affected = self.purge_and_repair(tx, &deactivated)?;
            Ok(DeactivationReport {
                deactivated_users_count: deactivated.len(),
                affected_prs_count: affected,
            })
        })?;

        info!(
            team = team_name,
            deactivated = report.deactivated_users_count,
            affected_prs = report.affected_prs_count,
            "team deactivated"
        );
        Ok(report)
    }

    /// Remove `user_ids` from every open pull request and refill the
    /// affected pull requests from all active users.
    ///
    /// Must run inside the same transaction that made `user_ids` inactive.
    /// Returns the number of pull requests that lost a reviewer.
    pub(crate) fn purge_and_repair(
        &self,
        tx: &dyn UnitOfWork,
        user_ids: &[String],
    ) -> Result<usize> {
        let affected = tx.open_prs_with_reviewers_in(user_ids)?;
        if affected.is_empty() {
            return Ok(0);
        }

        let removed = tx.remove_reviewers_in(user_ids)?;
        debug!(removed, prs = affected.len(), "removed inactive reviewers");

        let prs = tx.prs_with_reviewers(&affected)?;
        let pool = tx.all_active_users()?;
        let target = self.config.reviewers_per_pr;

        let mut links = Vec::new();
        self.draw(|rng| {
            for pr in prs.values() {
                let repair = repair_pr(rng, pr, &pool, target);
                if repair.is_under_reviewed(target) {
                    debug!(
                        pr = %pr.pull_request_id,
                        reviewers = repair.reviewers.len(),
                        target,
                        "pull request left under-reviewed"
                    );
                } else {
                    debug!(
                        pr = %pr.pull_request_id,
                        replacements = ?repair.replacements,
                        "pull request repaired"
                    );
                }
                links.extend(
                    repair
                        .replacements
                        .into_iter()
                        .map(|user_id| (pr.pull_request_id.clone(), user_id)),
                );
            }
        });

        tx.bulk_add_reviewers(&links)?;
        Ok(affected.len())
    }
}
