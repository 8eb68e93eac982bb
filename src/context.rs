//! Per-run state threaded through every importer: configuration, the error
//! counter and the shared exists-or-create step.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{error, info, warn};

use crate::config::MigrationConfig;
use crate::error::Result;

/// Kinds of destination entities the importer creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    UserKey,
    Organization,
    TeamMember,
    Repository,
    Collaborator,
    Label,
    Milestone,
    Issue,
    Comment,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "User"),
            Self::UserKey => write!(f, "Public key"),
            Self::Organization => write!(f, "Organization"),
            Self::TeamMember => write!(f, "Team member"),
            Self::Repository => write!(f, "Repository"),
            Self::Collaborator => write!(f, "Collaborator"),
            Self::Label => write!(f, "Label"),
            Self::Milestone => write!(f, "Milestone"),
            Self::Issue => write!(f, "Issue"),
            Self::Comment => write!(f, "Comment"),
        }
    }
}

/// Result of one exists-or-create step.
#[derive(Debug)]
pub enum Outcome<T = (), E = ()> {
    /// Entity was absent and has been created.
    Created(T),
    /// Entity was already present; carries what the lookup found.
    AlreadyExists(E),
    /// Creation was attempted and failed.
    Failed(String),
}

impl<T, E> Outcome<T, E> {
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Totals reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub created: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl RunSummary {
    pub fn is_successful(&self) -> bool {
        self.errors == 0
    }
}

pub struct RunContext {
    pub config: MigrationConfig,
    errors: AtomicUsize,
    created: AtomicUsize,
    skipped: AtomicUsize,
}

impl RunContext {
    pub fn new(config: MigrationConfig) -> Self {
        Self {
            config,
            errors: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
        }
    }

    /// Logs a failed operation and counts it toward the run's error total.
    pub fn fail(&self, message: impl AsRef<str>) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        error!("{}", message.as_ref());
    }

    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            created: self.created.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            errors: self.error_count(),
        }
    }

    /// Exists-or-create with a boolean existence check.
    pub async fn upsert<T>(
        &self,
        kind: EntityKind,
        key: &str,
        exists: impl Future<Output = Result<bool>>,
        create: impl Future<Output = Result<T>>,
    ) -> Outcome<T> {
        let lookup = async { exists.await.map(|found| found.then_some(())) };
        self.upsert_found(kind, key, lookup, create).await
    }

    /// Exists-or-create where the lookup hands back the existing entity.
    ///
    /// A failed lookup is logged and treated as "absent". `create` is only
    /// polled when nothing was found.
    pub async fn upsert_found<T, E>(
        &self,
        kind: EntityKind,
        key: &str,
        lookup: impl Future<Output = Result<Option<E>>>,
        create: impl Future<Output = Result<T>>,
    ) -> Outcome<T, E> {
        match lookup.await {
            Ok(Some(existing)) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                warn!("{kind} {key} already exists, skipping!");
                return Outcome::AlreadyExists(existing);
            }
            Ok(None) => info!("{kind} {key} not found, importing!"),
            Err(e) => self.fail(format!("Failed to look up {kind} {key}: {e}")),
        }

        match create.await {
            Ok(created) => {
                self.created.fetch_add(1, Ordering::Relaxed);
                info!("{kind} {key} imported!");
                Outcome::Created(created)
            }
            Err(e) => {
                self.fail(format!("{kind} {key} import failed: {e}"));
                Outcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrationError;
    use std::sync::atomic::AtomicBool;

    fn context() -> RunContext {
        RunContext::new(MigrationConfig::new("http://gl", "a", "http://gt", "b"))
    }

    #[tokio::test]
    async fn test_upsert_skips_existing_without_creating() {
        let ctx = context();
        let created = AtomicBool::new(false);
        let outcome = ctx
            .upsert(EntityKind::Label, "bug", async { Ok(true) }, async {
                created.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(outcome, Outcome::AlreadyExists(())));
        assert!(!created.load(Ordering::SeqCst));
        assert_eq!(ctx.summary().skipped, 1);
        assert_eq!(ctx.error_count(), 0);
    }

    #[tokio::test]
    async fn test_upsert_creates_missing() {
        let ctx = context();
        let outcome = ctx
            .upsert(EntityKind::Milestone, "v1", async { Ok(false) }, async { Ok(42) })
            .await;
        assert!(matches!(outcome, Outcome::Created(42)));
        assert_eq!(ctx.summary(), RunSummary { created: 1, skipped: 0, errors: 0 });
    }

    #[tokio::test]
    async fn test_failed_lookup_counts_and_still_creates() {
        let ctx = context();
        let outcome = ctx
            .upsert(
                EntityKind::Issue,
                "Bug A",
                async {
                    Err(MigrationError::Api {
                        status: 500,
                        message: "boom".to_string(),
                    })
                },
                async { Ok(()) },
            )
            .await;
        assert!(outcome.is_created());
        assert_eq!(ctx.error_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_create_counts() {
        let ctx = context();
        let outcome: Outcome<()> = ctx
            .upsert(EntityKind::Repository, "team/repo", async { Ok(false) }, async {
                Err(MigrationError::Api {
                    status: 409,
                    message: "repo exists".to_string(),
                })
            })
            .await;
        assert!(outcome.is_failed());
        assert_eq!(ctx.error_count(), 1);
        assert!(!ctx.summary().is_successful());
    }
}
