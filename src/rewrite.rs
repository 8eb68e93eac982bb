//! Body rewriting: issue cross-references and embedded upload links.

use std::collections::HashMap;

use itertools::Itertools;
use regex::{Captures, Regex};

use crate::error::{MigrationError, Result};

lazy_static::lazy_static! {
    /// Same-instance reference written as a root-relative markdown link,
    /// e.g. `](/group/repo/-/issues/7)`.
    static ref RELATIVE_ISSUE_LINK: Regex =
        Regex::new(r"\]\(/((?:[\w.\-]+/)*)([\w.\-]+)/([\w.\-]+)/-/issues/(\d+)\)").unwrap();

    /// Upload-relative markdown target, e.g. `(/uploads/<secret>/<file>)`.
    static ref UPLOAD_LINK: Regex =
        Regex::new(r"\((/uploads/[0-9a-zA-Z]+/[^)\s]+)\)").unwrap();
}

/// Rewrites source issue URLs into destination issue URLs.
pub struct LinkRewriter {
    absolute: Regex,
    dest_url: String,
    /// Source `path_with_namespace` to destination `(owner, repo)`.
    projects: HashMap<String, (String, String)>,
}

impl LinkRewriter {
    pub fn new(source_url: &str, dest_url: &str) -> Result<Self> {
        let source_url = source_url.trim_end_matches('/');
        let pattern = format!(
            r"{}/((?:[\w.\-]+/)*)([\w.\-]+)/([\w.\-]+)/-/issues/(\d+)",
            regex::escape(source_url)
        );
        let absolute = Regex::new(&pattern)
            .map_err(|e| MigrationError::InvalidConfig(format!("source URL {source_url}: {e}")))?;
        Ok(Self {
            absolute,
            dest_url: dest_url.trim_end_matches('/').to_string(),
            projects: HashMap::new(),
        })
    }

    /// Registers where a source project lives on the destination, so links
    /// to it follow renamed owners and repositories.
    pub fn with_projects(mut self, projects: HashMap<String, (String, String)>) -> Self {
        self.projects = projects;
        self
    }

    fn target(&self, caps: &Captures) -> String {
        let full_path = format!("{}{}/{}", &caps[1], &caps[2], &caps[3]);
        let (owner, repo) = match self.projects.get(&full_path) {
            Some((owner, repo)) => (owner.as_str(), repo.as_str()),
            None => (&caps[2], &caps[3]),
        };
        format!("{}/{owner}/{repo}/issues/{}", self.dest_url, &caps[4])
    }

    /// Rewrites absolute and root-relative issue references. Applying it to
    /// an already rewritten body changes nothing.
    pub fn rewrite(&self, body: &str) -> String {
        let absolute = self
            .absolute
            .replace_all(body, |caps: &Captures| self.target(caps));
        RELATIVE_ISSUE_LINK
            .replace_all(&absolute, |caps: &Captures| format!("]({})", self.target(caps)))
            .into_owned()
    }
}

/// Upload paths referenced by a body, in order of first appearance.
pub fn find_uploads(body: &str) -> Vec<String> {
    UPLOAD_LINK
        .captures_iter(body)
        .map(|caps| caps[1].to_string())
        .unique()
        .collect()
}

/// File name of an upload path, used for the scratch file and the asset name.
pub fn upload_file_name(upload_path: &str) -> String {
    upload_path
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("attachment")
        .to_string()
}

/// Replaces every `(upload_path)` link target with `(new_url)`.
pub fn replace_upload(body: &str, upload_path: &str, new_url: &str) -> String {
    body.replace(&format!("({upload_path})"), &format!("({new_url})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rewriter() -> LinkRewriter {
        LinkRewriter::new("https://gitlab.source.com", "https://gitea.dest.com").unwrap()
    }

    #[test]
    fn test_rewrites_absolute_issue_link() {
        let body = "Duplicate of https://gitlab.source.com/group/repo/-/issues/7, see there.";
        assert_eq!(
            rewriter().rewrite(body),
            "Duplicate of https://gitea.dest.com/group/repo/issues/7, see there."
        );
    }

    #[test]
    fn test_rewrites_nested_group_to_last_two_segments() {
        let body = "https://gitlab.source.com/org/sub/repo/-/issues/12";
        assert_eq!(
            rewriter().rewrite(body),
            "https://gitea.dest.com/sub/repo/issues/12"
        );
    }

    #[test]
    fn test_rewrites_relative_markdown_link() {
        let body = "Blocked by [#3](/group/repo/-/issues/3).";
        assert_eq!(
            rewriter().rewrite(body),
            "Blocked by [#3](https://gitea.dest.com/group/repo/issues/3)."
        );
    }

    #[test]
    fn test_uses_registered_project_names() {
        let projects = HashMap::from([(
            "my-team/my-repo".to_string(),
            ("My_Team".to_string(), "My_Repo".to_string()),
        )]);
        let rewriter = rewriter().with_projects(projects);
        assert_eq!(
            rewriter.rewrite("https://gitlab.source.com/my-team/my-repo/-/issues/1"),
            "https://gitea.dest.com/My_Team/My_Repo/issues/1"
        );
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let body = "a https://gitlab.source.com/g/r/-/issues/7 b [x](/g/r/-/issues/8) c";
        let once = rewriter().rewrite(body);
        assert_eq!(rewriter().rewrite(&once), once);
    }

    #[test]
    fn test_leaves_foreign_links_alone() {
        let body = "https://gitlab.other.com/g/r/-/issues/7 and /g/r/-/merge_requests/2";
        assert_eq!(rewriter().rewrite(body), body);
    }

    #[test]
    fn test_find_uploads() {
        let body = "![a](/uploads/abc123/a.png) text [b.pdf](/uploads/def456/b.pdf) \
                    ![a again](/uploads/abc123/a.png)";
        assert_eq!(
            find_uploads(body),
            vec!["/uploads/abc123/a.png", "/uploads/def456/b.pdf"]
        );
        assert!(find_uploads("no uploads here").is_empty());
    }

    #[test]
    fn test_replace_upload() {
        let body = "![a](/uploads/abc123/a.png)";
        assert_eq!(
            replace_upload(body, "/uploads/abc123/a.png", "https://gitea.dest.com/attachments/u1"),
            "![a](https://gitea.dest.com/attachments/u1)"
        );
        assert_eq!(upload_file_name("/uploads/abc123/a.png"), "a.png");
    }
}
