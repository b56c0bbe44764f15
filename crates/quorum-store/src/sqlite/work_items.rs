use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use quorum_core::{
    Entity, PrStat, PrStatus, PullRequest, PullRequestShort, QuorumError, Result, ReviewerStat,
    Stats,
};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::{db_err, format_timestamp, parse_timestamp, placeholders, SqliteTx};
use crate::WorkItemStore;

/// Ids bound per `IN (...)` statement, well under SQLite's variable limit.
const MAX_BOUND_IDS: usize = 500;

const PR_COLUMNS: &str =
    "pull_request_id, pull_request_name, author_id, status, created_at, merged_at";

fn parse_status(idx: usize, value: &str) -> rusqlite::Result<PrStatus> {
    value.parse().map_err(|msg: String| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            Box::<dyn std::error::Error + Send + Sync>::from(msg),
        )
    })
}

/// Pull request row without reviewers; callers fill `assigned_reviewers`.
fn pr_from_row(row: &Row<'_>) -> rusqlite::Result<PullRequest> {
    let status: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let merged_at: Option<String> = row.get(5)?;
    Ok(PullRequest {
        pull_request_id: row.get(0)?,
        pull_request_name: row.get(1)?,
        author_id: row.get(2)?,
        status: parse_status(3, &status)?,
        assigned_reviewers: Vec::new(),
        created_at: parse_timestamp(4, &created_at)?,
        merged_at: merged_at
            .as_deref()
            .map(|value| parse_timestamp(5, value))
            .transpose()?,
    })
}

impl SqliteTx<'_> {
    fn reviewers_of(&self, pr_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .tx
            .prepare("SELECT user_id FROM pr_reviewers WHERE pull_request_id = ?1 ORDER BY rowid")
            .map_err(db_err("failed to prepare reviewer query"))?;
        let rows = stmt
            .query_map(params![pr_id], |row| row.get::<_, String>(0))
            .map_err(db_err("failed to query reviewers"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("failed to read reviewer row"))
    }

    fn insert_reviewer(&self, pr_id: &str, user_id: &str) -> Result<()> {
        self.tx
            .prepare_cached("INSERT INTO pr_reviewers (pull_request_id, user_id) VALUES (?1, ?2)")
            .and_then(|mut stmt| stmt.execute(params![pr_id, user_id]))
            .map_err(|e| {
                QuorumError::Database(format!(
                    "failed to assign {user_id} to pull request {pr_id}: {e}"
                ))
            })?;
        Ok(())
    }
}

impl WorkItemStore for SqliteTx<'_> {
    fn pr_exists(&self, pr_id: &str) -> Result<bool> {
        self.tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM pull_requests WHERE pull_request_id = ?1)",
                params![pr_id],
                |row| row.get(0),
            )
            .map_err(db_err("failed to check pull request"))
    }

    fn get_pr(&self, pr_id: &str) -> Result<Option<PullRequest>> {
        let pr = self
            .tx
            .query_row(
                &format!("SELECT {PR_COLUMNS} FROM pull_requests WHERE pull_request_id = ?1"),
                params![pr_id],
                pr_from_row,
            )
            .optional()
            .map_err(db_err("failed to load pull request"))?;

        match pr {
            Some(mut pr) => {
                pr.assigned_reviewers = self.reviewers_of(pr_id)?;
                Ok(Some(pr))
            }
            None => Ok(None),
        }
    }

    fn create_pr(&self, pr: &PullRequest) -> Result<()> {
        self.tx
            .execute(
                "INSERT INTO pull_requests
                     (pull_request_id, pull_request_name, author_id, status, created_at, merged_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    pr.pull_request_id,
                    pr.pull_request_name,
                    pr.author_id,
                    pr.status.as_str(),
                    format_timestamp(&pr.created_at),
                    pr.merged_at.as_ref().map(format_timestamp),
                ],
            )
            .map_err(|e| {
                QuorumError::Database(format!(
                    "failed to create pull request {}: {e}",
                    pr.pull_request_id
                ))
            })?;
        for reviewer in &pr.assigned_reviewers {
            self.insert_reviewer(&pr.pull_request_id, reviewer)?;
        }
        Ok(())
    }

    fn merge_pr(&self, pr_id: &str, merged_at: DateTime<Utc>) -> Result<PullRequest> {
        self.tx
            .execute(
                "UPDATE pull_requests SET status = 'MERGED', merged_at = ?2
                 WHERE pull_request_id = ?1 AND status = 'OPEN'",
                params![pr_id, format_timestamp(&merged_at)],
            )
            .map_err(db_err("failed to merge pull request"))?;
        self.get_pr(pr_id)?
            .ok_or_else(|| QuorumError::NotFound(Entity::PullRequest, pr_id.to_string()))
    }

    fn reassign_reviewer(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
        new_reviewer_id: &str,
    ) -> Result<()> {
        // Updating in place keeps the row, so the new reviewer takes the old
        // reviewer's position in the list.
        let changed = self
            .tx
            .execute(
                "UPDATE pr_reviewers SET user_id = ?3
                 WHERE pull_request_id = ?1 AND user_id = ?2
                   AND EXISTS (
                       SELECT 1 FROM pull_requests
                       WHERE pull_request_id = ?1 AND status = 'OPEN'
                   )",
                params![pr_id, old_reviewer_id, new_reviewer_id],
            )
            .map_err(db_err("failed to reassign reviewer"))?;
        if changed == 0 {
            return Err(QuorumError::Conflict(format!(
                "pull request {pr_id} changed before {old_reviewer_id} could be replaced"
            )));
        }
        Ok(())
    }

    fn open_prs_with_reviewers_in(&self, user_ids: &[String]) -> Result<Vec<String>> {
        let mut affected = BTreeSet::new();
        for chunk in user_ids.chunks(MAX_BOUND_IDS) {
            let sql = format!(
                "SELECT DISTINCT r.pull_request_id
                 FROM pr_reviewers r
                 JOIN pull_requests p ON p.pull_request_id = r.pull_request_id
                 WHERE p.status = 'OPEN' AND r.user_id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = self
                .tx
                .prepare(&sql)
                .map_err(db_err("failed to prepare affected pull request query"))?;
            let rows = stmt
                .query_map(params_from_iter(chunk), |row| row.get::<_, String>(0))
                .map_err(db_err("failed to query affected pull requests"))?;
            for row in rows {
                affected.insert(row.map_err(db_err("failed to read affected pull request"))?);
            }
        }
        Ok(affected.into_iter().collect())
    }

    fn remove_reviewers_in(&self, user_ids: &[String]) -> Result<usize> {
        let mut removed = 0;
        for chunk in user_ids.chunks(MAX_BOUND_IDS) {
            let sql = format!(
                "DELETE FROM pr_reviewers
                 WHERE user_id IN ({})
                   AND pull_request_id IN (
                       SELECT pull_request_id FROM pull_requests WHERE status = 'OPEN'
                   )",
                placeholders(chunk.len())
            );
            removed += self
                .tx
                .execute(&sql, params_from_iter(chunk))
                .map_err(db_err("failed to remove reviewer links"))?;
        }
        Ok(removed)
    }

    fn prs_with_reviewers(&self, pr_ids: &[String]) -> Result<BTreeMap<String, PullRequest>> {
        let mut prs = BTreeMap::new();
        for chunk in pr_ids.chunks(MAX_BOUND_IDS) {
            let marks = placeholders(chunk.len());

            let sql = format!(
                "SELECT {PR_COLUMNS} FROM pull_requests WHERE pull_request_id IN ({marks})"
            );
            let mut stmt = self
                .tx
                .prepare(&sql)
                .map_err(db_err("failed to prepare pull request query"))?;
            let rows = stmt
                .query_map(params_from_iter(chunk), pr_from_row)
                .map_err(db_err("failed to query pull requests"))?;
            for row in rows {
                let pr = row.map_err(db_err("failed to read pull request row"))?;
                prs.insert(pr.pull_request_id.clone(), pr);
            }

            // Every link of a pull request lands in the same chunk, so rowid
            // order per pull request survives the split.
            let sql = format!(
                "SELECT pull_request_id, user_id FROM pr_reviewers
                 WHERE pull_request_id IN ({marks})
                 ORDER BY rowid"
            );
            let mut stmt = self
                .tx
                .prepare(&sql)
                .map_err(db_err("failed to prepare reviewer query"))?;
            let rows = stmt
                .query_map(params_from_iter(chunk), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(db_err("failed to query reviewers"))?;
            for row in rows {
                let (pr_id, user_id) = row.map_err(db_err("failed to read reviewer row"))?;
                if let Some(pr) = prs.get_mut(&pr_id) {
                    pr.assigned_reviewers.push(user_id);
                }
            }
        }
        Ok(prs)
    }

    fn bulk_add_reviewers(&self, links: &[(String, String)]) -> Result<()> {
        for (pr_id, user_id) in links {
            self.insert_reviewer(pr_id, user_id)?;
        }
        Ok(())
    }

    fn prs_reviewed_by(&self, user_id: &str) -> Result<Vec<PullRequestShort>> {
        let mut stmt = self
            .tx
            .prepare(
                "SELECT p.pull_request_id, p.pull_request_name, p.author_id, p.status
                 FROM pull_requests p
                 JOIN pr_reviewers r ON r.pull_request_id = p.pull_request_id
                 WHERE r.user_id = ?1
                 ORDER BY p.created_at DESC, p.pull_request_id",
            )
            .map_err(db_err("failed to prepare review query"))?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                let status: String = row.get(3)?;
                Ok(PullRequestShort {
                    pull_request_id: row.get(0)?,
                    pull_request_name: row.get(1)?,
                    author_id: row.get(2)?,
                    status: parse_status(3, &status)?,
                })
            })
            .map_err(db_err("failed to query reviews"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("failed to read review row"))
    }

    fn stats(&self) -> Result<Stats> {
        let (total_prs, open_prs, merged_prs) = self
            .tx
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(status = 'OPEN'), 0),
                        COALESCE(SUM(status = 'MERGED'), 0)
                 FROM pull_requests",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .map_err(db_err("failed to count pull requests"))?;

        let mut stmt = self
            .tx
            .prepare(
                "SELECT u.user_id, u.username,
                        COUNT(*),
                        COALESCE(SUM(p.status = 'OPEN'), 0),
                        COALESCE(SUM(p.status = 'MERGED'), 0)
                 FROM pr_reviewers r
                 JOIN users u ON u.user_id = r.user_id
                 JOIN pull_requests p ON p.pull_request_id = r.pull_request_id
                 GROUP BY u.user_id, u.username
                 ORDER BY COUNT(*) DESC, u.username, u.user_id",
            )
            .map_err(db_err("failed to prepare reviewer stats"))?;
        let reviewer_stats = stmt
            .query_map([], |row| {
                Ok(ReviewerStat {
                    user_id: row.get(0)?,
                    username: row.get(1)?,
                    total_assigned: row.get::<_, i64>(2)? as usize,
                    open_assigned: row.get::<_, i64>(3)? as usize,
                    merged_assigned: row.get::<_, i64>(4)? as usize,
                })
            })
            .map_err(db_err("failed to query reviewer stats"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("failed to read reviewer stats"))?;

        let mut stmt = self
            .tx
            .prepare(
                "SELECT p.pull_request_id, p.pull_request_name, p.status, COUNT(r.user_id)
                 FROM pull_requests p
                 LEFT JOIN pr_reviewers r ON r.pull_request_id = p.pull_request_id
                 GROUP BY p.pull_request_id
                 ORDER BY p.created_at DESC, p.pull_request_id",
            )
            .map_err(db_err("failed to prepare pull request stats"))?;
        let pr_stats = stmt
            .query_map([], |row| {
                let status: String = row.get(2)?;
                Ok(PrStat {
                    pull_request_id: row.get(0)?,
                    pull_request_name: row.get(1)?,
                    status: parse_status(2, &status)?,
                    reviewers_count: row.get::<_, i64>(3)? as usize,
                })
            })
            .map_err(db_err("failed to query pull request stats"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("failed to read pull request stats"))?;

        Ok(Stats {
            total_prs: total_prs as usize,
            open_prs: open_prs as usize,
            merged_prs: merged_prs as usize,
            reviewer_stats,
            pr_stats,
        })
    }
}
