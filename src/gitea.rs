//! Client for the destination Gitea instance.
//!
//! Request and response types mirror the Gitea v1 API, limited to the fields
//! the migration reads or writes.

use reqwest::{multipart, Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::error::{MigrationError, Result};
use crate::http;

const PAGE_LIMIT: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct GiteaVersion {
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GiteaUser {
    pub id: i64,
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GiteaOrg {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl GiteaOrg {
    pub fn login(&self) -> Option<&str> {
        self.username.as_deref().or(self.name.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GiteaTeam {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GiteaKey {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GiteaLabel {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GiteaMilestone {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GiteaIssue {
    pub id: i64,
    pub number: i64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GiteaComment {
    pub id: i64,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GiteaAttachment {
    pub browser_download_url: String,
}

#[derive(Debug, Serialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub login_name: String,
    pub password: String,
    pub must_change_password: bool,
    pub send_notify: bool,
    pub source_id: i64,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct CreateKeyRequest {
    pub key: String,
    pub read_only: bool,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateAvatarRequest {
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct CreateOrgRequest {
    pub username: String,
    pub full_name: String,
    pub description: String,
    pub location: String,
    pub website: String,
}

#[derive(Debug, Serialize)]
pub struct CreateLabelRequest {
    pub name: String,
    pub color: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct MigrateRepoRequest {
    pub auth_username: String,
    pub auth_password: String,
    pub clone_addr: String,
    pub description: String,
    pub mirror: bool,
    pub private: bool,
    pub repo_name: String,
    pub repo_owner: String,
    pub uid: i64,
    pub service: String,
}

#[derive(Debug, Serialize)]
pub struct CollaboratorRequest {
    pub permission: String,
}

#[derive(Debug, Serialize)]
pub struct CreateMilestoneRequest {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_on: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EditMilestoneRequest {
    pub state: String,
}

#[derive(Debug, Serialize)]
pub struct CreateIssueRequest {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    pub assignees: Vec<String>,
    pub closed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub labels: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct BodyRequest {
    pub body: String,
}

/// Admin-token client for the Gitea v1 API.
pub struct GiteaClient {
    client: Client,
    web_url: String,
    api_url: String,
    token: String,
}

impl GiteaClient {
    pub fn new(gitea_url: &str, token: &str) -> Result<Self> {
        let web_url = gitea_url.trim_end_matches('/').to_string();
        Ok(Self {
            client: http::create_client()?,
            api_url: format!("{web_url}/api/v1"),
            web_url,
            token: token.to_string(),
        })
    }

    pub fn web_url(&self) -> &str {
        &self.web_url
    }

    fn request(&self, method: Method, path: &str, sudo: Option<&str>) -> RequestBuilder {
        let url = format!("{}{path}", self.api_url);
        let builder = self
            .client
            .request(method, url)
            .header("Authorization", format!("token {}", self.token));
        match sudo {
            Some(username) => builder.header("Sudo", username),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        http::ensure_success(builder.send().await?).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self
            .send(self.request(Method::GET, path, None).query(query))
            .await?;
        let payload = &response.text().await?;
        Ok(serde_json::from_str(payload)?)
    }

    /// Pages until an empty page comes back or `X-Total-Count` is reached.
    /// The server may cap `limit` below what was asked for, so a short page
    /// does not mean the listing is complete.
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut all_items = vec![];
        let mut page = 1;
        loop {
            let page_str = page.to_string();
            let limit = PAGE_LIMIT.to_string();
            let mut paged_query = query.to_vec();
            paged_query.push(("limit", limit.as_str()));
            paged_query.push(("page", page_str.as_str()));
            let response = self
                .send(self.request(Method::GET, path, None).query(&paged_query))
                .await?;
            let total = total_count(&response);
            let payload = &response.text().await?;
            let mut items: Vec<T> = serde_json::from_str(payload)?;
            if items.is_empty() {
                break;
            }
            all_items.append(&mut items);
            if total.is_some_and(|total| all_items.len() >= total) {
                break;
            }
            page += 1;
        }
        debug!("Fetched {} items from {}", all_items.len(), path);
        Ok(all_items)
    }

    /// `true` on success, `false` on 404, error otherwise.
    async fn resource_exists(&self, path: &str) -> Result<bool> {
        let response = self.request(Method::GET, path, None).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        http::ensure_success(response).await?;
        Ok(true)
    }

    async fn write<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        sudo: Option<&str>,
    ) -> Result<T> {
        let response = self
            .send(self.request(method, path, sudo).json(body))
            .await?;
        let payload = &response.text().await?;
        Ok(serde_json::from_str(payload)?)
    }

    async fn write_empty<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        sudo: Option<&str>,
    ) -> Result<()> {
        let mut builder = self.request(method, path, sudo);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.send(builder).await?;
        Ok(())
    }

    pub async fn fetch_version(&self) -> Result<String> {
        let version: GiteaVersion = self.get("/version", &[]).await.map_err(|e| {
            if e.is_forbidden() {
                MigrationError::AuthenticationFailed("Gitea rejected the token".to_string())
            } else {
                e
            }
        })?;
        Ok(version.version)
    }

    // Users

    pub async fn user_exists(&self, username: &str) -> Result<bool> {
        self.resource_exists(&format!("/users/{username}")).await
    }

    /// Looks up a user; `None` on 404.
    pub async fn fetch_user(&self, username: &str) -> Result<Option<GiteaUser>> {
        match self.get(&format!("/users/{username}"), &[]).await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<GiteaUser> {
        self.write(Method::POST, "/admin/users", request, None).await
    }

    pub async fn fetch_user_keys(&self, username: &str) -> Result<Vec<GiteaKey>> {
        self.get_all(&format!("/users/{username}/keys"), &[]).await
    }

    pub async fn create_user_key(&self, username: &str, request: &CreateKeyRequest) -> Result<()> {
        self.write_empty(
            Method::POST,
            &format!("/admin/users/{username}/keys"),
            Some(request),
            None,
        )
        .await
    }

    /// Sets the avatar of `username`, acting as that user.
    pub async fn update_user_avatar(&self, username: &str, request: &UpdateAvatarRequest) -> Result<()> {
        self.write_empty(Method::POST, "/user/avatar", Some(request), Some(username))
            .await
    }

    // Organizations

    pub async fn org_exists(&self, org: &str) -> Result<bool> {
        self.resource_exists(&format!("/orgs/{org}")).await
    }

    pub async fn fetch_org(&self, org: &str) -> Result<Option<GiteaOrg>> {
        match self.get(&format!("/orgs/{org}"), &[]).await {
            Ok(org) => Ok(Some(org)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create_org(&self, request: &CreateOrgRequest) -> Result<GiteaOrg> {
        self.write(Method::POST, "/orgs", request, None).await
    }

    /// Gitea answers 204 for members and 404 (or a redirect to the public
    /// member list) otherwise.
    pub async fn is_org_member(&self, org: &str, username: &str) -> Result<bool> {
        let response = self
            .request(Method::GET, &format!("/orgs/{org}/members/{username}"), None)
            .send()
            .await?;
        Ok(response.status() == StatusCode::NO_CONTENT)
    }

    pub async fn fetch_org_teams(&self, org: &str) -> Result<Vec<GiteaTeam>> {
        self.get_all(&format!("/orgs/{org}/teams"), &[]).await
    }

    pub async fn fetch_team_members(&self, team_id: i64) -> Result<Vec<GiteaUser>> {
        self.get_all(&format!("/teams/{team_id}/members"), &[]).await
    }

    pub async fn add_team_member(&self, team_id: i64, username: &str) -> Result<()> {
        self.write_empty::<()>(
            Method::PUT,
            &format!("/teams/{team_id}/members/{username}"),
            None,
            None,
        )
        .await
    }

    pub async fn fetch_org_labels(&self, org: &str) -> Result<Vec<GiteaLabel>> {
        self.get_all(&format!("/orgs/{org}/labels"), &[]).await
    }

    pub async fn create_org_label(&self, org: &str, request: &CreateLabelRequest) -> Result<GiteaLabel> {
        self.write(Method::POST, &format!("/orgs/{org}/labels"), request, None)
            .await
    }

    // Repositories

    pub async fn repo_exists(&self, owner: &str, repo: &str) -> Result<bool> {
        self.resource_exists(&format!("/repos/{owner}/{repo}")).await
    }

    pub async fn delete_repo(&self, owner: &str, repo: &str) -> Result<()> {
        self.write_empty::<()>(Method::DELETE, &format!("/repos/{owner}/{repo}"), None, None)
            .await
    }

    pub async fn migrate_repo(&self, request: &MigrateRepoRequest) -> Result<()> {
        self.write_empty(Method::POST, "/repos/migrate", Some(request), None)
            .await
    }

    pub async fn collaborator_exists(&self, owner: &str, repo: &str, username: &str) -> Result<bool> {
        self.resource_exists(&format!("/repos/{owner}/{repo}/collaborators/{username}"))
            .await
    }

    pub async fn add_collaborator(
        &self,
        owner: &str,
        repo: &str,
        username: &str,
        request: &CollaboratorRequest,
    ) -> Result<()> {
        self.write_empty(
            Method::PUT,
            &format!("/repos/{owner}/{repo}/collaborators/{username}"),
            Some(request),
            None,
        )
        .await
    }

    // Labels and milestones

    pub async fn fetch_repo_labels(&self, owner: &str, repo: &str) -> Result<Vec<GiteaLabel>> {
        self.get_all(&format!("/repos/{owner}/{repo}/labels"), &[])
            .await
    }

    pub async fn create_repo_label(
        &self,
        owner: &str,
        repo: &str,
        request: &CreateLabelRequest,
    ) -> Result<GiteaLabel> {
        self.write(
            Method::POST,
            &format!("/repos/{owner}/{repo}/labels"),
            request,
            None,
        )
        .await
    }

    pub async fn fetch_milestones(&self, owner: &str, repo: &str) -> Result<Vec<GiteaMilestone>> {
        self.get_all(
            &format!("/repos/{owner}/{repo}/milestones"),
            &[("state", "all")],
        )
        .await
    }

    pub async fn create_milestone(
        &self,
        owner: &str,
        repo: &str,
        request: &CreateMilestoneRequest,
    ) -> Result<GiteaMilestone> {
        self.write(
            Method::POST,
            &format!("/repos/{owner}/{repo}/milestones"),
            request,
            None,
        )
        .await
    }

    pub async fn update_milestone(
        &self,
        owner: &str,
        repo: &str,
        milestone_id: i64,
        request: &EditMilestoneRequest,
    ) -> Result<()> {
        self.write_empty(
            Method::PATCH,
            &format!("/repos/{owner}/{repo}/milestones/{milestone_id}"),
            Some(request),
            None,
        )
        .await
    }

    // Issues and comments

    pub async fn fetch_issues(&self, owner: &str, repo: &str) -> Result<Vec<GiteaIssue>> {
        self.get_all(
            &format!("/repos/{owner}/{repo}/issues"),
            &[("state", "all"), ("type", "issues")],
        )
        .await
    }

    pub async fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        request: &CreateIssueRequest,
        sudo: Option<&str>,
    ) -> Result<GiteaIssue> {
        self.write(
            Method::POST,
            &format!("/repos/{owner}/{repo}/issues"),
            request,
            sudo,
        )
        .await
    }

    pub async fn update_issue_body(&self, owner: &str, repo: &str, number: i64, body: &str) -> Result<()> {
        let request = BodyRequest {
            body: body.to_string(),
        };
        self.write_empty(
            Method::PATCH,
            &format!("/repos/{owner}/{repo}/issues/{number}"),
            Some(&request),
            None,
        )
        .await
    }

    pub async fn fetch_comments(&self, owner: &str, repo: &str, number: i64) -> Result<Vec<GiteaComment>> {
        // The comments endpoint is not paginated.
        self.get(&format!("/repos/{owner}/{repo}/issues/{number}/comments"), &[])
            .await
    }

    pub async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        body: &str,
        sudo: Option<&str>,
    ) -> Result<GiteaComment> {
        self.write(
            Method::POST,
            &format!("/repos/{owner}/{repo}/issues/{number}/comments"),
            &BodyRequest {
                body: body.to_string(),
            },
            sudo,
        )
        .await
    }

    pub async fn update_comment_body(&self, owner: &str, repo: &str, comment_id: i64, body: &str) -> Result<()> {
        let request = BodyRequest {
            body: body.to_string(),
        };
        self.write_empty(
            Method::PATCH,
            &format!("/repos/{owner}/{repo}/issues/comments/{comment_id}"),
            Some(&request),
            None,
        )
        .await
    }

    /// Uploads `bytes` as an attachment of an issue or comment.
    pub async fn upload_asset(
        &self,
        target: &AssetTarget,
        owner: &str,
        repo: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<GiteaAttachment> {
        let path = match target {
            AssetTarget::Issue(number) => format!("/repos/{owner}/{repo}/issues/{number}/assets"),
            AssetTarget::Comment(id) => {
                format!("/repos/{owner}/{repo}/issues/comments/{id}/assets")
            }
        };
        let part = multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = multipart::Form::new().part("attachment", part);
        let response = self
            .send(self.request(Method::POST, &path, None).multipart(form))
            .await?;
        let payload = &response.text().await?;
        Ok(serde_json::from_str(payload)?)
    }
}

fn total_count(response: &Response) -> Option<usize> {
    response
        .headers()
        .get("X-Total-Count")?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Where an uploaded asset gets attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetTarget {
    /// Issue, by its repository-local number.
    Issue(i64),
    /// Comment, by its global id.
    Comment(i64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn issue(number: i64) -> serde_json::Value {
        serde_json::json!({
            "id": number + 1000,
            "number": number,
            "title": format!("Issue {number}"),
            "body": ""
        })
    }

    #[tokio::test]
    async fn test_get_all_pages_past_a_capped_limit() {
        let mock_server = MockServer::start().await;
        let first_page: Vec<_> = (1..=30).map(issue).collect();
        let second_page: Vec<_> = (31..=40).map(issue).collect();
        Mock::given(method("GET"))
            .and(path("/api/v1/repos/team/repo/issues"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(first_page))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/repos/team/repo/issues"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(second_page))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/repos/team/repo/issues"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = GiteaClient::new(&mock_server.uri(), "t0k").unwrap();
        let issues = client.fetch_issues("team", "repo").await.unwrap();
        assert_eq!(issues.len(), 40);
        let found = crate::exists::find_issue(&client, "team", "repo", "Issue 35")
            .await
            .unwrap();
        assert_eq!(found.map(|issue| issue.number), Some(35));
    }

    #[tokio::test]
    async fn test_get_all_stops_at_total_count() {
        let mock_server = MockServer::start().await;
        let labels = serde_json::json!([{"id": 1, "name": "bug"}, {"id": 2, "name": "ui"}]);
        Mock::given(method("GET"))
            .and(path("/api/v1/orgs/team/labels"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Total-Count", "2")
                    .set_body_json(labels),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = GiteaClient::new(&mock_server.uri(), "t0k").unwrap();
        let labels = client.fetch_org_labels("team").await.unwrap();
        assert_eq!(labels.len(), 2);
    }

    #[tokio::test]
    async fn test_resource_exists_maps_404_to_false() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/repos/team/present"))
            .and(header("Authorization", "token t0k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1})))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/repos/team/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/repos/team/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        let client = GiteaClient::new(&mock_server.uri(), "t0k").unwrap();
        assert!(client.repo_exists("team", "present").await.unwrap());
        assert!(!client.repo_exists("team", "missing").await.unwrap());
        let err = client.repo_exists("team", "broken").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_create_issue_sends_sudo_header() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/repos/team/repo/issues"))
            .and(header("Sudo", "alice"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": 10,
                "number": 1,
                "title": "Bug A",
                "body": "text"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = GiteaClient::new(&mock_server.uri(), "t0k").unwrap();
        let request = CreateIssueRequest {
            title: "Bug A".to_string(),
            body: "text".to_string(),
            assignee: None,
            assignees: vec![],
            closed: false,
            due_date: None,
            labels: vec![],
            milestone: None,
        };
        let issue = client
            .create_issue("team", "repo", &request, Some("alice"))
            .await
            .unwrap();
        assert_eq!(issue.number, 1);
    }

    #[test]
    fn test_org_login_prefers_username() {
        let org: GiteaOrg = serde_json::from_value(serde_json::json!({
            "id": 3,
            "name": "My_Team",
            "username": "My_Team"
        }))
        .unwrap();
        assert_eq!(org.login(), Some("My_Team"));

        let org: GiteaOrg =
            serde_json::from_value(serde_json::json!({"id": 3, "name": "Other"})).unwrap();
        assert_eq!(org.login(), Some("Other"));
    }
}
