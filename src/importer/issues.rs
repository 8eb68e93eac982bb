use std::collections::HashMap;

use tracing::{info, warn};

use super::{Importer, OwnerKind, RepoTarget};
use crate::context::{EntityKind, Outcome};
use crate::exists;
use crate::format::{
    annotate_comment_body, annotate_issue_body, format_timestamp, normalize_due_date,
};
use crate::gather::IssueBundle;
use crate::gitea::{AssetTarget, CreateIssueRequest, GiteaLabel, GiteaMilestone};
use crate::types::{SourceIssue, SourceNote, UserRef};

/// Who a body is written as: impersonated via `Sudo`, or by the token user
/// with an `Author:` line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Authorship {
    Impersonated(String),
    Annotated(String),
}

impl Authorship {
    fn sudo(&self) -> Option<&str> {
        match self {
            Self::Impersonated(username) => Some(username),
            Self::Annotated(_) => None,
        }
    }

    fn author_line(&self) -> Option<&str> {
        match self {
            Self::Impersonated(_) => None,
            Self::Annotated(name) => Some(name),
        }
    }
}

/// Destination labels and milestones issues refer to, loaded once per project.
struct IssueRefs {
    labels: Vec<GiteaLabel>,
    milestones: Vec<GiteaMilestone>,
}

impl IssueRefs {
    fn label_ids(&self, names: &[String]) -> Vec<i64> {
        names
            .iter()
            .filter_map(|name| self.labels.iter().find(|label| &label.name == name))
            .map(|label| label.id)
            .collect()
    }

    fn milestone_id(&self, title: &str) -> Option<i64> {
        self.milestones
            .iter()
            .find(|milestone| milestone.title == title)
            .map(|milestone| milestone.id)
    }
}

impl Importer<'_> {
    pub async fn import_issues(&self, issues: &[IssueBundle], target: &RepoTarget<'_>) {
        let owner = &target.owner.login;
        let org = target.owner.org();
        let labels = match exists::merged_labels(self.dest, owner, &target.name, org).await {
            Ok(labels) => labels,
            Err(e) => {
                self.ctx.fail(format!(
                    "Failed to load existing labels for {}: {e}",
                    target.full_name()
                ));
                vec![]
            }
        };
        let milestones = match self.dest.fetch_milestones(owner, &target.name).await {
            Ok(milestones) => milestones,
            Err(e) => {
                self.ctx.fail(format!(
                    "Failed to load existing milestones for {}: {e}",
                    target.full_name()
                ));
                vec![]
            }
        };
        let refs = IssueRefs { labels, milestones };
        let mut authors = HashMap::new();

        for bundle in issues {
            let authorship = self
                .authorship(target, &bundle.issue.author, &mut authors)
                .await;
            let imported = self
                .import_issue(&bundle.issue, target, &refs, &authorship)
                .await;
            let Some(number) = imported else {
                continue;
            };
            for note in &bundle.notes {
                let authorship = self.authorship(target, &note.author, &mut authors).await;
                self.import_comment(note, number, target, &authorship).await;
            }
        }
    }

    /// Creates the issue unless one with the same title exists. Returns the
    /// destination issue number either way, `None` on failure.
    async fn import_issue(
        &self,
        issue: &SourceIssue,
        target: &RepoTarget<'_>,
        refs: &IssueRefs,
        authorship: &Authorship,
    ) -> Option<i64> {
        let owner = &target.owner.login;
        let created_at = format_timestamp(issue.created_at, self.ctx.config.timezone);
        let body = self
            .links
            .rewrite(issue.description.as_deref().unwrap_or_default());
        let body = annotate_issue_body(&body, &created_at, authorship.author_line());

        let due_date = issue.due_date.as_deref().and_then(normalize_due_date);
        let milestone = issue
            .milestone
            .as_ref()
            .and_then(|milestone| refs.milestone_id(&milestone.title));
        let request = CreateIssueRequest {
            title: issue.title.clone(),
            body: body.clone(),
            assignee: issue.assignee.as_ref().map(|a| a.username.clone()),
            assignees: issue.assignees.iter().map(|a| a.username.clone()).collect(),
            closed: issue.is_closed(),
            due_date,
            labels: refs.label_ids(&issue.labels),
            milestone,
        };

        let outcome = self
            .ctx
            .upsert_found(
                EntityKind::Issue,
                &format!("{} in {}", issue.title, target.full_name()),
                exists::find_issue(self.dest, owner, &target.name, &issue.title),
                self.dest
                    .create_issue(owner, &target.name, &request, authorship.sudo()),
            )
            .await;

        match outcome {
            Outcome::Created(created) => {
                let rehosted = self
                    .rehost_attachments(target, AssetTarget::Issue(created.number), &body)
                    .await;
                if rehosted != body {
                    match self
                        .dest
                        .update_issue_body(owner, &target.name, created.number, &rehosted)
                        .await
                    {
                        Ok(()) => info!("Issue {} body updated with attachments", issue.title),
                        Err(e) => self
                            .ctx
                            .fail(format!("Issue {} body update failed: {e}", issue.title)),
                    }
                }
                Some(created.number)
            }
            Outcome::AlreadyExists(existing) => Some(existing.number),
            Outcome::Failed(_) => None,
        }
    }

    async fn import_comment(
        &self,
        note: &SourceNote,
        issue_number: i64,
        target: &RepoTarget<'_>,
        authorship: &Authorship,
    ) {
        let owner = &target.owner.login;
        let created_at = format_timestamp(note.created_at, self.ctx.config.timezone);
        let body = annotate_comment_body(
            &self.links.rewrite(&note.body),
            &created_at,
            authorship.author_line(),
        );
        let key = format!(
            "by {} on {}#{issue_number}",
            note.author.username,
            target.full_name()
        );

        let outcome = self
            .ctx
            .upsert(
                EntityKind::Comment,
                &key,
                exists::comment_exists(self.dest, owner, &target.name, issue_number, &body),
                self.dest.create_comment(
                    owner,
                    &target.name,
                    issue_number,
                    &body,
                    authorship.sudo(),
                ),
            )
            .await;

        if let Outcome::Created(comment) = outcome {
            let rehosted = self
                .rehost_attachments(target, AssetTarget::Comment(comment.id), &body)
                .await;
            if rehosted != body {
                match self
                    .dest
                    .update_comment_body(owner, &target.name, comment.id, &rehosted)
                    .await
                {
                    Ok(()) => info!("Comment {key} body updated with attachments"),
                    Err(e) => self.ctx.fail(format!("Comment {key} body update failed: {e}")),
                }
            }
        }
    }

    /// Authors can be impersonated when they own the repository or belong to
    /// the owning organization. Answers are cached per project.
    async fn authorship(
        &self,
        target: &RepoTarget<'_>,
        author: &UserRef,
        cache: &mut HashMap<String, bool>,
    ) -> Authorship {
        let username = &author.username;
        let impersonate = match cache.get(username) {
            Some(known) => *known,
            None => {
                let known = match target.owner.kind {
                    OwnerKind::User => target.owner.login.eq_ignore_ascii_case(username),
                    OwnerKind::Organization => {
                        match self.dest.is_org_member(&target.owner.login, username).await {
                            Ok(member) => member,
                            Err(e) => {
                                warn!(
                                    "Could not check membership of {username} in {}: {e}",
                                    target.owner.login
                                );
                                false
                            }
                        }
                    }
                };
                cache.insert(username.clone(), known);
                known
            }
        };
        if impersonate {
            Authorship::Impersonated(username.clone())
        } else {
            Authorship::Annotated(author.name.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorship_accessors() {
        let impersonated = Authorship::Impersonated("alice".to_string());
        assert_eq!(impersonated.sudo(), Some("alice"));
        assert_eq!(impersonated.author_line(), None);

        let annotated = Authorship::Annotated("Bob Builder".to_string());
        assert_eq!(annotated.sudo(), None);
        assert_eq!(annotated.author_line(), Some("Bob Builder"));
    }

    #[test]
    fn test_issue_refs_lookup() {
        let refs = IssueRefs {
            labels: vec![
                GiteaLabel {
                    id: 1,
                    name: "bug".to_string(),
                },
                GiteaLabel {
                    id: 2,
                    name: "ui".to_string(),
                },
            ],
            milestones: vec![GiteaMilestone {
                id: 9,
                title: "v1".to_string(),
            }],
        };
        assert_eq!(
            refs.label_ids(&["ui".to_string(), "missing".to_string(), "bug".to_string()]),
            vec![2, 1]
        );
        assert_eq!(refs.milestone_id("v1"), Some(9));
        assert_eq!(refs.milestone_id("v2"), None);
    }
}
