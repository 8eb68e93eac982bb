//! Run configuration, read from the environment (and `.env` via dotenv).

use std::path::PathBuf;

use chrono::{FixedOffset, Offset, Utc};
use chrono_tz::Tz;

use crate::env::{load_env, load_flag, load_optional, load_required};
use crate::error::{MigrationError, Result};

/// Which part of the source gets migrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationScope {
    /// Every user, group and project visible to the token.
    Full,
    /// Only groups the token can access, their projects, and the users
    /// reachable through group and project membership.
    Groups,
}

/// Zone used when stamping creation times into issue and comment bodies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timezone {
    Fixed(FixedOffset),
    /// An IANA zone; its offset follows daylight saving time.
    Named(Tz),
}

/// Configuration for a migration run.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Source instance root, e.g. `https://gitlab.source.com`.
    pub gitlab_url: String,
    pub gitlab_token: String,
    /// Clone credentials handed to the destination's migrate call.
    pub gitlab_admin_user: String,
    pub gitlab_admin_pass: String,
    /// Destination instance root, e.g. `https://gitea.dest.com`.
    pub gitea_url: String,
    pub gitea_token: String,
    pub scope: MigrationScope,
    /// Delete an existing destination repository before importing it.
    pub wipe_repos: bool,
    /// Archive each project on the source before importing it.
    pub archive_source: bool,
    /// Create pull mirrors instead of one-off copies.
    pub mirror_repos: bool,
    /// Destination user put into a team whose source members could not be listed.
    pub fallback_member: Option<String>,
    pub notify_users: bool,
    /// Zone used when rendering creation timestamps into bodies.
    pub timezone: Timezone,
    pub scratch_dir: PathBuf,
    pub password_file: PathBuf,
}

impl MigrationConfig {
    /// Minimal configuration with every toggle off.
    pub fn new(
        gitlab_url: impl Into<String>,
        gitlab_token: impl Into<String>,
        gitea_url: impl Into<String>,
        gitea_token: impl Into<String>,
    ) -> Self {
        Self {
            gitlab_url: trim_url(gitlab_url.into()),
            gitlab_token: gitlab_token.into(),
            gitlab_admin_user: String::new(),
            gitlab_admin_pass: String::new(),
            gitea_url: trim_url(gitea_url.into()),
            gitea_token: gitea_token.into(),
            scope: MigrationScope::Full,
            wipe_repos: false,
            archive_source: false,
            mirror_repos: false,
            fallback_member: None,
            notify_users: false,
            timezone: Timezone::Fixed(utc()),
            scratch_dir: PathBuf::from("cache/attachments"),
            password_file: PathBuf::from("user_passwords.csv"),
        }
    }

    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(
            load_required("GITLAB_URL")?,
            load_required("GITLAB_TOKEN")?,
            load_required("GITEA_URL")?,
            load_required("GITEA_TOKEN")?,
        );
        config.gitlab_admin_user = load_env("GITLAB_ADMIN_USER");
        config.gitlab_admin_pass = load_env("GITLAB_ADMIN_PASS");
        config.scope = if load_flag("MIGRATE_BY_GROUPS") {
            MigrationScope::Groups
        } else {
            MigrationScope::Full
        };
        config.wipe_repos = load_flag("GITEA_WIPE_REPOS");
        config.archive_source = load_flag("GITLAB_ARCHIVE_MIGRATED_PROJECTS");
        config.mirror_repos = load_flag("GITEA_MIRROR_REPOS");
        config.fallback_member = load_optional("GITLAB_FALLBACK_GROUP_MEMBER");
        config.notify_users = load_flag("GITEA_NOTIFY_USERS");
        if let Some(zone) = load_optional("MIGRATION_TIMEZONE") {
            config.timezone = parse_timezone(&zone)?;
        }
        if let Some(dir) = load_optional("MIGRATION_SCRATCH_DIR") {
            config.scratch_dir = PathBuf::from(dir);
        }
        if let Some(file) = load_optional("MIGRATION_PASSWORD_FILE") {
            config.password_file = PathBuf::from(file);
        }
        Ok(config)
    }

    /// Both admin credentials empty means the destination clones over SSH.
    pub fn uses_ssh_clone(&self) -> bool {
        self.gitlab_admin_user.is_empty() && self.gitlab_admin_pass.is_empty()
    }
}

/// Inputs of the `import-actions` command.
#[derive(Debug, Clone)]
pub struct ActionsConfig {
    pub database_url: String,
    pub user_id: i64,
    pub repo_id: i64,
    pub branch: String,
    pub commit_log: PathBuf,
}

impl ActionsConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: load_required("ACTIONS_DATABASE_URL")?,
            user_id: parse_id("ACTIONS_USER_ID", &load_required("ACTIONS_USER_ID")?)?,
            repo_id: parse_id("ACTIONS_REPO_ID", &load_required("ACTIONS_REPO_ID")?)?,
            branch: load_optional("ACTIONS_BRANCH").unwrap_or_else(|| "master".to_string()),
            commit_log: load_optional("ACTIONS_COMMIT_LOG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/tmp/commit.log")),
        })
    }
}

fn parse_id(key: &str, value: &str) -> Result<i64> {
    value.parse().map_err(|_| {
        MigrationError::InvalidConfig(format!("{key} must be an integer, got {value}"))
    })
}

/// Parses a UTC offset such as `+01:00`, `-0530` or `Z`, or an IANA zone
/// name such as `Europe/Vienna`.
pub fn parse_timezone(value: &str) -> Result<Timezone> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return Ok(Timezone::Fixed(utc()));
    }
    if let Ok(offset) = value.parse::<FixedOffset>() {
        return Ok(Timezone::Fixed(offset));
    }
    value.parse::<Tz>().map(Timezone::Named).map_err(|_| {
        MigrationError::InvalidConfig(format!(
            "MIGRATION_TIMEZONE {value} is neither a UTC offset nor a known zone"
        ))
    })
}

fn utc() -> FixedOffset {
    Utc.fix()
}

fn trim_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slashes() {
        let config = MigrationConfig::new(
            "https://gitlab.source.com/",
            "a",
            "https://gitea.dest.com//",
            "b",
        );
        assert_eq!(config.gitlab_url, "https://gitlab.source.com");
        assert_eq!(config.gitea_url, "https://gitea.dest.com");
        assert_eq!(config.scope, MigrationScope::Full);
        assert!(config.uses_ssh_clone());
    }

    #[test]
    fn test_parse_timezone() {
        let offset = |value| match parse_timezone(value).unwrap() {
            Timezone::Fixed(offset) => offset.local_minus_utc(),
            Timezone::Named(tz) => panic!("{value} parsed as zone {tz}"),
        };
        assert_eq!(offset("+01:00"), 3600);
        assert_eq!(offset("-05:30"), -19800);
        assert_eq!(offset("UTC"), 0);
        assert_eq!(
            parse_timezone("Europe/Vienna").unwrap(),
            Timezone::Named(chrono_tz::Europe::Vienna)
        );
        assert!(matches!(
            parse_timezone("Mars/Olympus"),
            Err(MigrationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("X", "42").unwrap(), 42);
        assert!(matches!(parse_id("X", "abc"), Err(MigrationError::InvalidConfig(_))));
    }
}
