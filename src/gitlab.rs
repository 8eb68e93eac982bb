//! Read-only client for the source GitLab instance.

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{MigrationError, Result};
use crate::http;
use crate::types::{
    Membership, SourceGroup, SourceIssue, SourceKey, SourceLabel, SourceMember, SourceMilestone,
    SourceNote, SourceProject, SourceUser, SourceVersion,
};

const PER_PAGE: usize = 100;

pub struct GitLabClient {
    client: Client,
    web_url: String,
    api_url: String,
    token: String,
}

impl GitLabClient {
    pub fn new(gitlab_url: &str, token: &str) -> Result<Self> {
        let web_url = gitlab_url.trim_end_matches('/').to_string();
        Ok(Self {
            client: http::create_client()?,
            api_url: format!("{web_url}/api/v4"),
            web_url,
            token: token.to_string(),
        })
    }

    pub fn web_url(&self) -> &str {
        &self.web_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{path}", self.api_url);
        let response = self
            .client
            .get(url)
            .query(query)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?;
        let payload = &http::ensure_success(response).await?.text().await?;
        Ok(serde_json::from_str(payload)?)
    }

    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut all_items = vec![];
        let mut latest_page = 1;
        let mut latest_len = 0;
        while latest_len == PER_PAGE || latest_page == 1 {
            let page = latest_page.to_string();
            let per_page = PER_PAGE.to_string();
            let mut paged_query = query.to_vec();
            paged_query.push(("per_page", &per_page));
            paged_query.push(("page", &page));
            let mut items: Vec<T> = self.get(path, &paged_query).await?;
            latest_len = items.len();
            latest_page += 1;
            all_items.append(&mut items);
        }
        debug!("Fetched {} items from {}", all_items.len(), path);
        Ok(all_items)
    }

    /// Username of the token owner; fails when the token is rejected.
    pub async fn fetch_current_user(&self) -> Result<String> {
        let user: SourceUser = self.get("/user", &[]).await.map_err(|e| {
            if e.is_forbidden() {
                MigrationError::AuthenticationFailed("GitLab rejected the token".to_string())
            } else {
                e
            }
        })?;
        Ok(user.username)
    }

    pub async fn fetch_version(&self) -> Result<String> {
        let version: SourceVersion = self.get("/version", &[]).await?;
        Ok(version.version)
    }

    pub async fn fetch_all_users(&self) -> Result<Vec<SourceUser>> {
        self.get_all("/users", &[]).await
    }

    pub async fn fetch_user_keys(&self, user_id: u64) -> Result<Vec<SourceKey>> {
        self.get_all(&format!("/users/{user_id}/keys"), &[]).await
    }

    /// Groups visible to the token. Admin tokens see every group either way;
    /// `all_available` widens the list for non-admin tokens in full mode.
    pub async fn fetch_all_groups(&self, all_available: bool) -> Result<Vec<SourceGroup>> {
        let all_available = all_available.to_string();
        self.get_all("/groups", &[("all_available", &all_available)])
            .await
    }

    pub async fn fetch_members(&self, membership: &Membership) -> Result<Vec<SourceMember>> {
        let path = format!("/{}/{}/members", membership.url_prefix(), membership.id());
        self.get_all(&path, &[]).await
    }

    pub async fn fetch_group_labels(&self, group_id: u64) -> Result<Vec<SourceLabel>> {
        self.get_all(
            &format!("/groups/{group_id}/labels"),
            &[("include_ancestor_groups", "false")],
        )
        .await
    }

    pub async fn fetch_all_projects(&self) -> Result<Vec<SourceProject>> {
        self.get_all("/projects", &[]).await
    }

    pub async fn fetch_all_groups_projects(&self, group_id: u64) -> Result<Vec<SourceProject>> {
        self.get_all(&format!("/groups/{group_id}/projects"), &[])
            .await
    }

    pub async fn fetch_project_labels(&self, project_id: u64) -> Result<Vec<SourceLabel>> {
        self.get_all(
            &format!("/projects/{project_id}/labels"),
            &[("include_ancestor_groups", "false")],
        )
        .await
    }

    pub async fn fetch_project_milestones(&self, project_id: u64) -> Result<Vec<SourceMilestone>> {
        self.get_all(&format!("/projects/{project_id}/milestones"), &[])
            .await
    }

    /// All issues of a project, ordered by their project-local id.
    pub async fn fetch_project_issues(&self, project_id: u64) -> Result<Vec<SourceIssue>> {
        let mut issues: Vec<SourceIssue> = self
            .get_all(
                &format!("/projects/{project_id}/issues"),
                &[("scope", "all")],
            )
            .await?;
        issues.sort_by_key(|issue| issue.iid);
        Ok(issues)
    }

    /// Notes of an issue, oldest first.
    pub async fn fetch_issue_notes(&self, project_id: u64, issue_iid: u64) -> Result<Vec<SourceNote>> {
        self.get_all(
            &format!("/projects/{project_id}/issues/{issue_iid}/notes"),
            &[("sort", "asc"), ("order_by", "created_at")],
        )
        .await
    }

    /// Downloads an attachment given its project-relative path
    /// (`/uploads/<secret>/<filename>`).
    pub async fn download_upload(&self, project_id: u64, upload_path: &str) -> Result<Vec<u8>> {
        let relative = upload_path.trim_start_matches('/');
        let url = format!("{}/projects/{project_id}/{relative}", self.api_url);
        let response = self
            .client
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?;
        let bytes = http::ensure_success(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    pub async fn download_avatar(&self, avatar_url: &str) -> Result<Vec<u8>> {
        let url = if avatar_url.starts_with('/') {
            format!("{}{avatar_url}", self.web_url)
        } else {
            avatar_url.to_string()
        };
        // Avatars may live on a third-party host (gravatar); the token stays home.
        let mut request = self.client.get(&url);
        if url.starts_with(&self.web_url) {
            request = request.header("PRIVATE-TOKEN", &self.token);
        }
        let response = request.send().await?;
        let bytes = http::ensure_success(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    pub async fn archive_project(&self, project_id: u64) -> Result<()> {
        let url = format!("{}/projects/{project_id}/archive", self.api_url);
        let response = self
            .client
            .post(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?;
        http::ensure_success(response).await?;
        Ok(())
    }
}
