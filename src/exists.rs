//! Destination-side existence checks, one per entity kind.
//!
//! Singular entities are looked up directly; everything else is listed and
//! filtered on its identity key.

use regex::Regex;

use crate::error::Result;
use crate::gitea::{GiteaClient, GiteaIssue, GiteaLabel};

lazy_static::lazy_static! {
    static ref ATTACHMENT_TARGET: Regex =
        Regex::new(r"\]\([^)\s]*/(?:uploads|attachments)/[^)\s]*\)").unwrap();
}

pub async fn user_exists(dest: &GiteaClient, username: &str) -> Result<bool> {
    dest.user_exists(username).await
}

pub async fn user_key_exists(dest: &GiteaClient, username: &str, title: &str) -> Result<bool> {
    let keys = dest.fetch_user_keys(username).await?;
    Ok(keys.iter().any(|key| key.title == title))
}

pub async fn organization_exists(dest: &GiteaClient, org: &str) -> Result<bool> {
    dest.org_exists(org).await
}

pub async fn team_member_exists(dest: &GiteaClient, team_id: i64, username: &str) -> Result<bool> {
    let members = dest.fetch_team_members(team_id).await?;
    Ok(members
        .iter()
        .any(|member| member.login.eq_ignore_ascii_case(username)))
}

pub async fn repo_exists(dest: &GiteaClient, owner: &str, repo: &str) -> Result<bool> {
    dest.repo_exists(owner, repo).await
}

pub async fn collaborator_exists(
    dest: &GiteaClient,
    owner: &str,
    repo: &str,
    username: &str,
) -> Result<bool> {
    dest.collaborator_exists(owner, repo, username).await
}

pub async fn org_label_exists(dest: &GiteaClient, org: &str, name: &str) -> Result<bool> {
    let labels = dest.fetch_org_labels(org).await?;
    Ok(labels.iter().any(|label| label.name == name))
}

/// Labels visible to a repository: its own plus, for organization-owned
/// repositories, the organization's.
pub async fn merged_labels(
    dest: &GiteaClient,
    owner: &str,
    repo: &str,
    org: Option<&str>,
) -> Result<Vec<GiteaLabel>> {
    let mut labels = dest.fetch_repo_labels(owner, repo).await?;
    if let Some(org) = org {
        labels.extend(dest.fetch_org_labels(org).await?);
    }
    Ok(labels)
}

/// A label counts as present if either the repository or its organization has it.
pub async fn label_exists(
    dest: &GiteaClient,
    owner: &str,
    repo: &str,
    org: Option<&str>,
    name: &str,
) -> Result<bool> {
    let labels = merged_labels(dest, owner, repo, org).await?;
    Ok(labels.iter().any(|label| label.name == name))
}

pub async fn milestone_exists(dest: &GiteaClient, owner: &str, repo: &str, title: &str) -> Result<bool> {
    let milestones = dest.fetch_milestones(owner, repo).await?;
    Ok(milestones.iter().any(|milestone| milestone.title == title))
}

pub async fn find_issue(
    dest: &GiteaClient,
    owner: &str,
    repo: &str,
    title: &str,
) -> Result<Option<GiteaIssue>> {
    let issues = dest.fetch_issues(owner, repo).await?;
    Ok(issues.into_iter().find(|issue| issue.title == title))
}

/// Comments are matched on their full body within one issue. Attachment
/// link targets are ignored, since re-hosting rewrites them after creation.
pub async fn comment_exists(
    dest: &GiteaClient,
    owner: &str,
    repo: &str,
    issue_number: i64,
    body: &str,
) -> Result<bool> {
    let comments = dest.fetch_comments(owner, repo, issue_number).await?;
    Ok(comments
        .iter()
        .any(|comment| same_comment_body(&comment.body, body)))
}

pub fn same_comment_body(existing: &str, candidate: &str) -> bool {
    normalize_attachments(existing.trim()) == normalize_attachments(candidate.trim())
}

fn normalize_attachments(body: &str) -> String {
    ATTACHMENT_TARGET
        .replace_all(body, "](attachment)")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_comment_body_ignores_rehosted_links() {
        let source = "See ![shot](/uploads/abc123/shot.png)\n\n> Created: T";
        let rehosted =
            "See ![shot](https://gitea.dest.com/attachments/6f1c-77aa)\n\n> Created: T";
        assert!(same_comment_body(rehosted, source));
    }

    #[test]
    fn test_same_comment_body_distinguishes_text() {
        assert!(!same_comment_body("Me too.", "Me three."));
        assert!(same_comment_body("Me too.\n", "Me too."));
    }
}
