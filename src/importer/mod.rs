//! Entity importers. Each sub-module translates one kind of source record
//! into destination calls, always through [`RunContext::upsert`].

mod attachments;
mod groups;
mod issues;
mod labels;
mod milestones;
mod repos;
mod users;

pub use repos::{map_access_level, AccessMapping, Permission};

use crate::context::RunContext;
use crate::gitea::GiteaClient;
use crate::gitlab::GitLabClient;
use crate::rewrite::LinkRewriter;

/// Whether a destination repository belongs to a user or an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    User,
    Organization,
}

/// Destination owner a source project resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoOwner {
    pub id: i64,
    pub login: String,
    pub kind: OwnerKind,
}

impl RepoOwner {
    /// Organization name, for organization-owned repositories.
    pub fn org(&self) -> Option<&str> {
        match self.kind {
            OwnerKind::Organization => Some(&self.login),
            OwnerKind::User => None,
        }
    }
}

/// Destination coordinates of an imported project.
pub struct RepoTarget<'p> {
    pub project_id: u64,
    pub owner: &'p RepoOwner,
    pub name: String,
}

impl RepoTarget<'_> {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner.login, self.name)
    }
}

pub struct Importer<'a> {
    ctx: &'a RunContext,
    source: &'a GitLabClient,
    dest: &'a GiteaClient,
    links: &'a LinkRewriter,
}

impl<'a> Importer<'a> {
    pub fn new(
        ctx: &'a RunContext,
        source: &'a GitLabClient,
        dest: &'a GiteaClient,
        links: &'a LinkRewriter,
    ) -> Self {
        Self {
            ctx,
            source,
            dest,
            links,
        }
    }
}
