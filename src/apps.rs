//! Entry points of the binary: the full migration and the activity import.

use std::collections::HashMap;

use tracing::{error, info, warn};

use crate::actions;
use crate::config::{ActionsConfig, MigrationConfig};
use crate::context::{RunContext, RunSummary};
use crate::error::Result;
use crate::format::clean_name;
use crate::gather::{self, Gathered, ProjectBundle};
use crate::gitea::GiteaClient;
use crate::gitlab::GitLabClient;
use crate::importer::{Importer, RepoTarget};
use crate::rewrite::LinkRewriter;
use crate::types::SourceProject;

/// Runs a complete migration: users, groups, then every project with its
/// collaborators, labels, milestones, issues and comments.
///
/// Only startup failures (configuration, connection, authentication, top-level
/// listings) are returned as errors; per-entity failures are counted in the
/// summary.
pub async fn run_migration(config: MigrationConfig) -> Result<RunSummary> {
    info!("---=== GitLab to Gitea migration ===---");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let source = GitLabClient::new(&config.gitlab_url, &config.gitlab_token)?;
    let dest = GiteaClient::new(&config.gitea_url, &config.gitea_token)?;

    let username = source.fetch_current_user().await?;
    let version = source.fetch_version().await?;
    info!("Connected to GitLab as {username}, version: {version}");
    let version = dest.fetch_version().await?;
    info!("Connected to Gitea, version: {version}");

    let inventory = gather::gather_inventory(&source, config.scope).await?;
    let links = LinkRewriter::new(source.web_url(), dest.web_url())?
        .with_projects(destination_names(&inventory.projects));

    let ctx = RunContext::new(config);
    let importer = Importer::new(&ctx, &source, &dest, &links);

    importer.import_users(&inventory.users).await;
    importer.import_groups(&inventory.groups).await;

    for project in inventory.projects {
        let path = project.path_with_namespace.clone();
        match gather::gather_project(&source, project).await {
            Gathered::Complete(bundle) => import_project(&ctx, &source, &importer, bundle).await,
            Gathered::Partial { value, reason } => {
                warn!("Project {path} gathered partially: {reason}");
                import_project(&ctx, &source, &importer, value).await;
            }
            Gathered::Skipped { reason } => warn!("This project failed, skipping: {reason}"),
        }
    }

    let summary = ctx.summary();
    info!(
        "Created {} entities, skipped {} existing ones",
        summary.created, summary.skipped
    );
    if summary.is_successful() {
        info!("Migration finished with no errors!");
    } else {
        error!("Migration finished with {} errors!", summary.errors);
    }
    Ok(summary)
}

/// Where each source project is expected to land, for link rewriting.
fn destination_names(projects: &[SourceProject]) -> HashMap<String, (String, String)> {
    projects
        .iter()
        .map(|project| {
            let namespace = &project.namespace;
            let owner = match namespace.kind.as_deref() {
                Some("user") => clean_name(&namespace.path),
                _ => clean_name(&namespace.name),
            };
            (
                project.path_with_namespace.clone(),
                (owner, clean_name(&project.name)),
            )
        })
        .collect()
}

async fn import_project(
    ctx: &RunContext,
    source: &GitLabClient,
    importer: &Importer<'_>,
    bundle: ProjectBundle,
) {
    let project = &bundle.project;
    let name = clean_name(&project.name);
    info!(
        "Importing project {name} from owner {}",
        clean_name(&project.namespace.name)
    );

    if ctx.config.archive_source && !project.archived {
        match source.archive_project(project.id).await {
            Ok(()) => info!("Project {} archived on GitLab", project.path_with_namespace),
            Err(e) => ctx.fail(format!(
                "Failed to archive project {}: {e}",
                project.path_with_namespace
            )),
        }
    }

    let Some(owner) = importer.resolve_owner(project).await else {
        ctx.fail(format!("Failed to load project owner for project {name}"));
        return;
    };
    let target = RepoTarget {
        project_id: project.id,
        owner: &owner,
        name,
    };

    if !importer.import_repo(project, &target).await {
        warn!(
            "Repository {} missing, skipping its collaborators, labels, milestones and issues",
            target.full_name()
        );
        return;
    }
    importer
        .import_collaborators(&bundle.collaborators, &target)
        .await;
    importer.import_labels(&bundle.labels, &target).await;
    importer.import_milestones(&bundle.milestones, &target).await;
    importer.import_issues(&bundle.issues, &target).await;
}

/// Inserts the commit log into Gitea's activity table. Returns the number of
/// rows written.
pub async fn import_actions(config: ActionsConfig) -> Result<u64> {
    let contents = tokio::fs::read_to_string(&config.commit_log).await?;
    let commits = actions::parse_commit_log(&contents);
    info!(
        "Read {} commits from {}",
        commits.len(),
        config.commit_log.display()
    );
    let inserted = actions::insert_actions(&config, &commits).await?;
    info!("{inserted} actions inserted.");
    Ok(inserted)
}
