//! Source-side data gathering. Results say explicitly whether a record was
//! gathered completely, partially, or has to be skipped.

use itertools::Itertools;
use tracing::{info, warn};

use crate::config::MigrationScope;
use crate::error::Result;
use crate::gitlab::GitLabClient;
use crate::types::{
    Membership, SourceGroup, SourceIssue, SourceLabel, SourceMember, SourceMilestone, SourceNote,
    SourceProject, SourceUser,
};

#[derive(Debug)]
pub enum Gathered<T> {
    Complete(T),
    /// Usable, but some sub-resource could not be read.
    Partial { value: T, reason: String },
    Skipped { reason: String },
}

impl<T> Gathered<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Complete(value) | Self::Partial { value, .. } => Some(value),
            Self::Skipped { .. } => None,
        }
    }
}

#[derive(Debug)]
pub struct GroupBundle {
    pub group: SourceGroup,
    /// `None` when the token may not list the group's members.
    pub members: Option<Vec<SourceMember>>,
    pub labels: Vec<SourceLabel>,
}

#[derive(Debug)]
pub struct IssueBundle {
    pub issue: SourceIssue,
    /// User-written notes only, oldest first.
    pub notes: Vec<SourceNote>,
}

#[derive(Debug)]
pub struct ProjectBundle {
    pub project: SourceProject,
    pub collaborators: Vec<SourceMember>,
    pub labels: Vec<SourceLabel>,
    pub milestones: Vec<SourceMilestone>,
    pub issues: Vec<IssueBundle>,
}

/// Users, groups and projects selected for migration.
#[derive(Debug)]
pub struct Inventory {
    pub users: Vec<SourceUser>,
    pub groups: Vec<Gathered<GroupBundle>>,
    pub projects: Vec<SourceProject>,
}

pub async fn gather_inventory(source: &GitLabClient, scope: MigrationScope) -> Result<Inventory> {
    let groups = source
        .fetch_all_groups(scope == MigrationScope::Full)
        .await?;
    let mut group_bundles = Vec::with_capacity(groups.len());
    for group in groups {
        group_bundles.push(gather_group(source, group).await);
    }

    let (users, projects) = match scope {
        MigrationScope::Full => {
            let users = source.fetch_all_users().await?;
            let projects = source.fetch_all_projects().await?;
            (users, projects)
        }
        MigrationScope::Groups => {
            let mut projects = vec![];
            for bundle in group_bundles.iter().filter_map(Gathered::value) {
                projects.extend(source.fetch_all_groups_projects(bundle.group.id).await?);
            }
            let users = reachable_users(source, &group_bundles, &projects).await;
            (users, projects)
        }
    };
    let projects: Vec<_> = projects.into_iter().unique_by(|p| p.id).collect();

    info!(
        "Found {} users, {} groups and {} projects",
        users.len(),
        group_bundles.len(),
        projects.len()
    );
    Ok(Inventory {
        users,
        groups: group_bundles,
        projects,
    })
}

/// Users that are members of a gathered group or project.
async fn reachable_users(
    source: &GitLabClient,
    groups: &[Gathered<GroupBundle>],
    projects: &[SourceProject],
) -> Vec<SourceUser> {
    let mut members: Vec<SourceMember> = groups
        .iter()
        .filter_map(Gathered::value)
        .filter_map(|bundle| bundle.members.clone())
        .flatten()
        .collect();
    for project in projects {
        let membership = Membership::Project(project.clone());
        match source.fetch_members(&membership).await {
            Ok(project_members) => members.extend(project_members),
            Err(e) => warn!(
                "Could not list members of project {}: {e}",
                membership.key()
            ),
        }
    }
    members
        .into_iter()
        .unique_by(|member| member.id)
        .map(SourceUser::from)
        .collect()
}

pub async fn gather_group(source: &GitLabClient, group: SourceGroup) -> Gathered<GroupBundle> {
    let mut reasons = vec![];
    let membership = Membership::Group(group.clone());
    let members = match source.fetch_members(&membership).await {
        Ok(members) => Some(members),
        Err(e) if e.is_forbidden() => {
            reasons.push(format!("not allowed to list members of {}", membership.key()));
            None
        }
        Err(e) => {
            reasons.push(format!("failed to list members of {}: {e}", membership.key()));
            None
        }
    };
    let labels = match source.fetch_group_labels(group.id).await {
        Ok(labels) => labels,
        Err(e) => {
            reasons.push(format!("failed to list labels of {}: {e}", group.full_path));
            vec![]
        }
    };

    let bundle = GroupBundle {
        group,
        members,
        labels,
    };
    if reasons.is_empty() {
        Gathered::Complete(bundle)
    } else {
        Gathered::Partial {
            value: bundle,
            reason: reasons.join("; "),
        }
    }
}

/// Reads everything a project import needs. A forbidden member listing
/// leaves the project without collaborators; any other failure skips it.
pub async fn gather_project(source: &GitLabClient, project: SourceProject) -> Gathered<ProjectBundle> {
    match try_gather_project(source, &project).await {
        Ok((collaborators, labels, milestones, issues)) => {
            let forbidden = collaborators.is_none();
            let bundle = ProjectBundle {
                collaborators: collaborators.unwrap_or_default(),
                project,
                labels,
                milestones,
                issues,
            };
            if forbidden {
                Gathered::Partial {
                    reason: format!(
                        "not allowed to list members of {}",
                        bundle.project.path_with_namespace
                    ),
                    value: bundle,
                }
            } else {
                Gathered::Complete(bundle)
            }
        }
        Err(e) => Gathered::Skipped {
            reason: format!("{}: {e}", project.path_with_namespace),
        },
    }
}

type ProjectParts = (
    Option<Vec<SourceMember>>,
    Vec<SourceLabel>,
    Vec<SourceMilestone>,
    Vec<IssueBundle>,
);

async fn try_gather_project(source: &GitLabClient, project: &SourceProject) -> Result<ProjectParts> {
    let collaborators = match source
        .fetch_members(&Membership::Project(project.clone()))
        .await
    {
        Ok(members) => Some(members),
        Err(e) if e.is_forbidden() => None,
        Err(e) => return Err(e),
    };
    let labels = source.fetch_project_labels(project.id).await?;
    let milestones = source.fetch_project_milestones(project.id).await?;
    let issues = source.fetch_project_issues(project.id).await?;

    let mut bundles = Vec::with_capacity(issues.len());
    for issue in issues {
        let notes = source
            .fetch_issue_notes(project.id, issue.iid)
            .await?
            .into_iter()
            .filter(|note| !note.system)
            .collect();
        bundles.push(IssueBundle { issue, notes });
    }

    info!(
        "Found {} collaborators, {} labels, {} milestones and {} issues for project {}",
        collaborators.as_ref().map_or(0, Vec::len),
        labels.len(),
        milestones.len(),
        bundles.len(),
        project.path_with_namespace
    );
    Ok((collaborators, labels, milestones, bundles))
}
