//! Teams, users, and read-only reporting.

use quorum_core::{Entity, PullRequestShort, QuorumError, Result, Stats, Team, User};
use quorum_store::Store;
use tracing::info;

use crate::engine::ReviewEngine;

impl<S: Store> ReviewEngine<S> {
    /// Create a team and upsert its members into it.
    ///
    /// Existing users listed as members move to the new team. A member that
    /// arrives inactive is removed from open pull requests the same way an
    /// individual deactivation would.
    ///
    /// # Errors
    ///
    /// [`QuorumError::AlreadyExists`] if the team name is taken.
    pub fn add_team(&self, team: Team) -> Result<Team> {
        let team_name = team.team_name.clone();
        let stored = self.store.transaction(|tx| {
            if tx.team_exists(&team_name)? {
                return Err(QuorumError::AlreadyExists(Entity::Team, team_name.clone()));
            }
            tx.create_team(&team_name)?;

            let mut newly_inactive = Vec::new();
            for member in team.members {
                let user = member.into_user(&team_name);
                let was_active = tx.get_user(&user.user_id)?.is_some_and(|u| u.is_active);
                if was_active && !user.is_active {
                    newly_inactive.push(user.user_id.clone());
                }
                tx.upsert_user(&user)?;
            }
            newly_inactive.sort();
            newly_inactive.dedup();
            self.purge_and_repair(tx, &newly_inactive)?;

            tx.get_team(&team_name)?
                .ok_or_else(|| QuorumError::NotFound(Entity::Team, team_name.clone()))
        })?;

        info!(
            team = %stored.team_name,
            members = stored.members.len(),
            "team added"
        );
        Ok(stored)
    }

    /// Look up a team with its members ordered by username.
    ///
    /// # Errors
    ///
    /// [`QuorumError::NotFound`] if the team does not exist.
    pub fn get_team(&self, team_name: &str) -> Result<Team> {
        self.store.read(|tx| {
            tx.get_team(team_name)?
                .ok_or_else(|| QuorumError::NotFound(Entity::Team, team_name.to_string()))
        })
    }

    /// Set a user's active flag.
    ///
    /// Deactivating a user removes them from every open pull request and
    /// tops those pull requests back up, in the same transaction.
    ///
    /// # Errors
    ///
    /// [`QuorumError::NotFound`] if the user does not exist.
    pub fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User> {
        let (user, affected) = self.store.transaction(|tx| {
            let before = tx
                .get_user(user_id)?
                .ok_or_else(|| QuorumError::NotFound(Entity::User, user_id.to_string()))?;
            let user = tx
                .set_user_active(user_id, is_active)?
                .ok_or_else(|| QuorumError::NotFound(Entity::User, user_id.to_string()))?;

            let affected = if before.is_active && !is_active {
                self.purge_and_repair(tx, &[user_id.to_string()])?
            } else {
                0
            };
            Ok((user, affected))
        })?;

        info!(
            user = %user.user_id,
            is_active = user.is_active,
            affected_prs = affected,
            "user activity updated"
        );
        Ok(user)
    }

    /// Pull requests on which `user_id` is a reviewer, newest first.
    ///
    /// An unknown user has no reviews.
    pub fn user_reviews(&self, user_id: &str) -> Result<Vec<PullRequestShort>> {
        self.store.read(|tx| tx.prs_reviewed_by(user_id))
    }

    /// Aggregate assignment counts.
    pub fn stats(&self) -> Result<Stats> {
        self.store.read(|tx| tx.stats())
    }
}
