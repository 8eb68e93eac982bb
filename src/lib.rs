//! Migrates users, groups, repositories and issue history from a GitLab
//! instance to a Gitea instance over both HTTP APIs.
//!
//! Every step is idempotent: entities already present on the destination are
//! skipped, so an interrupted run can simply be started again.

pub mod actions;
pub mod apps;
pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod exists;
pub mod format;
pub mod gather;
pub mod gitea;
pub mod gitlab;
pub mod http;
pub mod importer;
pub mod logging;
pub mod rewrite;
pub mod types;

pub use config::{ActionsConfig, MigrationConfig, MigrationScope, Timezone};
pub use context::RunSummary;
pub use error::{MigrationError, Result};
