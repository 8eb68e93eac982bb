//! Backfills Gitea's activity feed with one commit action per line of a
//! `git log --pretty=format:'%H,%at,%s'` dump.

use sqlx::mysql::MySqlPoolOptions;
use tracing::{debug, warn};

use crate::config::ActionsConfig;
use crate::error::Result;

/// Gitea's `op_type` for a pushed commit.
pub const OP_TYPE_COMMIT: i64 = 5;

const INSERT_ACTION: &str = "INSERT INTO action \
    (user_id, op_type, act_user_id, repo_id, comment_id, ref_name, is_private, created_unix) \
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAction {
    pub hash: String,
    pub created_unix: i64,
}

/// Reads `<hash>,<unix timestamp>,<subject>` lines. Blank lines are ignored,
/// malformed ones are skipped with a warning.
pub fn parse_commit_log(contents: &str) -> Vec<CommitAction> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| {
            let parsed = parse_commit_line(line);
            if parsed.is_none() {
                warn!("Skipping malformed commit log line {}: {line:?}", index + 1);
            }
            parsed
        })
        .collect()
}

fn parse_commit_line(line: &str) -> Option<CommitAction> {
    // The subject may itself contain commas.
    let mut fields = line.splitn(3, ',');
    let hash = fields.next()?.trim();
    let created_unix = fields.next()?.trim().parse().ok()?;
    if hash.is_empty() {
        return None;
    }
    Some(CommitAction {
        hash: hash.to_string(),
        created_unix,
    })
}

/// Inserts every action in a single transaction; nothing is written if any
/// insert fails.
pub async fn insert_actions(config: &ActionsConfig, actions: &[CommitAction]) -> Result<u64> {
    let pool = MySqlPoolOptions::new()
        .max_connections(1)
        .connect(&config.database_url)
        .await?;

    let mut tx = pool.begin().await?;
    let mut total = 0;
    for action in actions {
        debug!("Inserting action for commit {}", action.hash);
        let result = sqlx::query(INSERT_ACTION)
            .bind(config.user_id)
            .bind(OP_TYPE_COMMIT)
            .bind(config.user_id)
            .bind(config.repo_id)
            .bind(0_i64)
            .bind(config.branch.as_str())
            .bind(true)
            .bind(action.created_unix)
            .execute(&mut *tx)
            .await?;
        total += result.rows_affected();
    }
    tx.commit().await?;
    pool.close().await;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commit_log() {
        let log = "\
a1b2c3,1700000000,Initial commit
d4e5f6,1700003600,Fix parser, lexer and docs

not-a-commit
0badc0de,yesterday,Broken timestamp
,1700007200,Missing hash
";
        assert_eq!(
            parse_commit_log(log),
            vec![
                CommitAction {
                    hash: "a1b2c3".to_string(),
                    created_unix: 1_700_000_000,
                },
                CommitAction {
                    hash: "d4e5f6".to_string(),
                    created_unix: 1_700_003_600,
                },
            ]
        );
    }

    #[test]
    fn test_parse_commit_line_without_subject() {
        assert_eq!(
            parse_commit_line("abc,42"),
            Some(CommitAction {
                hash: "abc".to_string(),
                created_unix: 42,
            })
        );
    }
}
