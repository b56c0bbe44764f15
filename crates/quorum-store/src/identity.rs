use quorum_core::{Result, Team, User};

/// Teams and users.
///
/// Users are never deleted; they move between teams through
/// [`upsert_user`](IdentityStore::upsert_user) and leave review duty by
/// becoming inactive.
pub trait IdentityStore {
    fn team_exists(&self, team_name: &str) -> Result<bool>;

    fn create_team(&self, team_name: &str) -> Result<()>;

    /// The team with its members ordered by username, or `None` if unknown.
    fn get_team(&self, team_name: &str) -> Result<Option<Team>>;

    fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    /// Insert the user or overwrite its name, team, and active flag.
    fn upsert_user(&self, user: &User) -> Result<()>;

    /// Set the active flag, returning the updated user or `None` if unknown.
    fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<Option<User>>;

    /// Active members of `team_name` other than `exclude_user_id`.
    fn active_team_members(&self, team_name: &str, exclude_user_id: &str) -> Result<Vec<User>>;

    /// Deactivate every active member of `team_name`.
    ///
    /// Returns the ids that were flipped, sorted. Members that were already
    /// inactive are not included.
    fn deactivate_team_users(&self, team_name: &str) -> Result<Vec<String>>;

    /// Every active user across all teams.
    fn all_active_users(&self) -> Result<Vec<User>>;
}
