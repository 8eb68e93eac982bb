use std::fmt;

use tracing::{info, warn};

use super::{Importer, OwnerKind, RepoOwner, RepoTarget};
use crate::context::EntityKind;
use crate::error::MigrationError;
use crate::exists;
use crate::format::{clean_name, truncate_description};
use crate::gitea::{CollaboratorRequest, MigrateRepoRequest};
use crate::types::{SourceMember, SourceProject};

/// Collaborator permission on the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read,
    Write,
    Admin,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// How a source access level carries over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMapping {
    Mapped(Permission),
    /// Unknown level, granted read access.
    Fallback(Permission),
    /// Owner level (50) only exists on groups and is not migrated.
    GroupOwner,
}

pub fn map_access_level(level: u32) -> AccessMapping {
    match level {
        10 | 20 => AccessMapping::Mapped(Permission::Read), // guest, reporter
        30 => AccessMapping::Mapped(Permission::Write),     // developer
        40 => AccessMapping::Mapped(Permission::Admin),     // maintainer
        50 => AccessMapping::GroupOwner,
        _ => AccessMapping::Fallback(Permission::Read),
    }
}

impl Importer<'_> {
    /// Resolves the destination owner of a project: a user named like the
    /// namespace path, else an organization named like the cleaned namespace.
    /// A failed lookup counts as an error and is treated as "absent".
    pub async fn resolve_owner(&self, project: &SourceProject) -> Option<RepoOwner> {
        let namespace = &project.namespace;
        let is_group = namespace.kind.as_deref() == Some("group");

        let user_name = clean_name(&namespace.path);
        // The user lookup may answer with a zero-id placeholder for organizations.
        let user = match self.dest.fetch_user(&user_name).await {
            Ok(user) => user.filter(|user| user.id != 0),
            Err(e) => {
                self.ctx
                    .fail(format!("Failed to look up user {user_name}: {e}"));
                None
            }
        };
        if let Some(user) = &user {
            if !is_group {
                return Some(RepoOwner {
                    id: user.id,
                    login: user.login.clone(),
                    kind: OwnerKind::User,
                });
            }
        }

        let org_name = clean_name(&namespace.name);
        match self.dest.fetch_org(&org_name).await {
            Ok(Some(org)) => {
                return Some(RepoOwner {
                    id: org.id,
                    login: org.login().unwrap_or(&org_name).to_string(),
                    kind: OwnerKind::Organization,
                })
            }
            Ok(None) => {}
            Err(e) => self
                .ctx
                .fail(format!("Failed to look up organization {org_name}: {e}")),
        }
        user.map(|user| RepoOwner {
            id: user.id,
            login: user.login,
            kind: OwnerKind::User,
        })
    }

    /// Creates the repository from the source clone URL. Returns `false`
    /// when it neither exists nor could be created.
    pub async fn import_repo(&self, project: &SourceProject, target: &RepoTarget<'_>) -> bool {
        let config = &self.ctx.config;
        let owner = &target.owner.login;
        let full_name = target.full_name();

        if config.wipe_repos {
            match self.dest.repo_exists(owner, &target.name).await {
                Ok(true) => match self.dest.delete_repo(owner, &target.name).await {
                    Ok(()) => warn!("Repository {full_name} deleted before re-import"),
                    Err(e) => self
                        .ctx
                        .fail(format!("Failed to delete repository {full_name}: {e}")),
                },
                Ok(false) => {}
                Err(e) => self
                    .ctx
                    .fail(format!("Failed to look up repository {full_name}: {e}")),
            }
        }

        let clone_addr = if config.uses_ssh_clone() {
            project.ssh_url_to_repo.clone()
        } else {
            project.http_url_to_repo.clone()
        };
        let (description, truncated) =
            truncate_description(project.description.as_deref().unwrap_or_default());
        if truncated {
            warn!("Description of {full_name} had to be truncated to 255 characters!");
        }
        let request = MigrateRepoRequest {
            auth_username: config.gitlab_admin_user.clone(),
            auth_password: config.gitlab_admin_pass.clone(),
            clone_addr,
            description,
            mirror: config.mirror_repos,
            private: project.is_private(),
            repo_name: target.name.clone(),
            repo_owner: owner.clone(),
            uid: target.owner.id,
            service: "git".to_string(),
        };

        let outcome = self
            .ctx
            .upsert(
                EntityKind::Repository,
                &full_name,
                exists::repo_exists(self.dest, owner, &target.name),
                self.dest.migrate_repo(&request),
            )
            .await;
        !outcome.is_failed()
    }

    pub async fn import_collaborators(&self, collaborators: &[SourceMember], target: &RepoTarget<'_>) {
        let owner = &target.owner.login;
        for collaborator in collaborators {
            let username = &collaborator.username;
            let permission = match map_access_level(collaborator.access_level) {
                AccessMapping::Mapped(permission) => permission,
                AccessMapping::Fallback(permission) => {
                    warn!(
                        "Unsupported access level {} for {username}, setting permissions to '{permission}'!",
                        collaborator.access_level
                    );
                    permission
                }
                AccessMapping::GroupOwner => {
                    let unsupported = MigrationError::UnsupportedFeature(format!(
                        "group owner {username} as collaborator on {}",
                        target.full_name()
                    ));
                    self.ctx.fail(format!("{unsupported}, skipping!"));
                    continue;
                }
            };

            let request = CollaboratorRequest {
                permission: permission.to_string(),
            };
            self.ctx
                .upsert(
                    EntityKind::Collaborator,
                    &format!("{username} on {}", target.full_name()),
                    exists::collaborator_exists(self.dest, owner, &target.name, username),
                    self.dest
                        .add_collaborator(owner, &target.name, username, &request),
                )
                .await;
        }
        info!("Collaborators of {} processed", target.full_name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_access_level_known_levels() {
        assert_eq!(map_access_level(10), AccessMapping::Mapped(Permission::Read));
        assert_eq!(map_access_level(20), AccessMapping::Mapped(Permission::Read));
        assert_eq!(map_access_level(30), AccessMapping::Mapped(Permission::Write));
        assert_eq!(map_access_level(40), AccessMapping::Mapped(Permission::Admin));
    }

    #[test]
    fn test_map_access_level_owner_and_unknown() {
        assert_eq!(map_access_level(50), AccessMapping::GroupOwner);
        for level in [0, 5, 15, 60] {
            assert_eq!(
                map_access_level(level),
                AccessMapping::Fallback(Permission::Read)
            );
        }
    }

    #[test]
    fn test_permission_wire_names() {
        assert_eq!(Permission::Read.to_string(), "read");
        assert_eq!(Permission::Write.to_string(), "write");
        assert_eq!(Permission::Admin.to_string(), "admin");
    }
}
