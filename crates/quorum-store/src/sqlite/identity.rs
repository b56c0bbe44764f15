use quorum_core::{QuorumError, Result, Team, TeamMember, User};
use rusqlite::{params, OptionalExtension, Row};

use super::{db_err, SqliteTx};
use crate::IdentityStore;

const USER_COLUMNS: &str = "user_id, username, team_name, is_active";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        username: row.get(1)?,
        team_name: row.get(2)?,
        is_active: row.get(3)?,
    })
}

impl SqliteTx<'_> {
    fn query_users(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<User>> {
        let mut stmt = self
            .tx
            .prepare(sql)
            .map_err(db_err("failed to prepare user query"))?;
        let rows = stmt
            .query_map(params, user_from_row)
            .map_err(db_err("failed to query users"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("failed to read user row"))
    }
}

impl IdentityStore for SqliteTx<'_> {
    fn team_exists(&self, team_name: &str) -> Result<bool> {
        self.tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM teams WHERE team_name = ?1)",
                params![team_name],
                |row| row.get(0),
            )
            .map_err(db_err("failed to check team"))
    }

    fn create_team(&self, team_name: &str) -> Result<()> {
        self.tx
            .execute("INSERT INTO teams (team_name) VALUES (?1)", params![team_name])
            .map_err(|e| QuorumError::Database(format!("failed to create team {team_name}: {e}")))?;
        Ok(())
    }

    fn get_team(&self, team_name: &str) -> Result<Option<Team>> {
        if !self.team_exists(team_name)? {
            return Ok(None);
        }
        let members = self
            .query_users(
                &format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE team_name = ?1 \
                     ORDER BY username, user_id"
                ),
                params![team_name],
            )?
            .into_iter()
            .map(TeamMember::from)
            .collect();
        Ok(Some(Team {
            team_name: team_name.to_string(),
            members,
        }))
    }

    fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.tx
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
                params![user_id],
                user_from_row,
            )
            .optional()
            .map_err(db_err("failed to load user"))
    }

    fn upsert_user(&self, user: &User) -> Result<()> {
        self.tx
            .execute(
                "INSERT INTO users (user_id, username, team_name, is_active)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET
                     username = excluded.username,
                     team_name = excluded.team_name,
                     is_active = excluded.is_active",
                params![user.user_id, user.username, user.team_name, user.is_active],
            )
            .map_err(|e| {
                QuorumError::Database(format!("failed to save user {}: {e}", user.user_id))
            })?;
        Ok(())
    }

    fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<Option<User>> {
        self.tx
            .query_row(
                &format!(
                    "UPDATE users SET is_active = ?2 WHERE user_id = ?1 RETURNING {USER_COLUMNS}"
                ),
                params![user_id, is_active],
                user_from_row,
            )
            .optional()
            .map_err(db_err("failed to update user"))
    }

    fn active_team_members(&self, team_name: &str, exclude_user_id: &str) -> Result<Vec<User>> {
        self.query_users(
            &format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE team_name = ?1 AND is_active = 1 AND user_id <> ?2
                 ORDER BY user_id"
            ),
            params![team_name, exclude_user_id],
        )
    }

    fn deactivate_team_users(&self, team_name: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .tx
            .prepare(
                "UPDATE users SET is_active = 0
                 WHERE team_name = ?1 AND is_active = 1
                 RETURNING user_id",
            )
            .map_err(db_err("failed to prepare deactivation"))?;
        let mut ids = stmt
            .query_map(params![team_name], |row| row.get::<_, String>(0))
            .map_err(db_err("failed to deactivate team members"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("failed to read deactivated user"))?;
        // RETURNING order is unspecified.
        ids.sort();
        Ok(ids)
    }

    fn all_active_users(&self) -> Result<Vec<User>> {
        self.query_users(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE is_active = 1 ORDER BY user_id"),
            [],
        )
    }
}
