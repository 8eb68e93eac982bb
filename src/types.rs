use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SourceUser {
    pub id: u64,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SourceKey {
    pub id: u64,
    pub title: String,
    pub key: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SourceGroup {
    pub id: u64,
    pub name: String,
    pub full_path: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SourceNamespace {
    pub id: u64,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SourceProject {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub path_with_namespace: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    pub http_url_to_repo: String,
    pub ssh_url_to_repo: String,
    #[serde(default)]
    pub archived: bool,
    pub namespace: SourceNamespace,
}

fn default_visibility() -> String {
    "private".to_string()
}

impl SourceProject {
    /// Private and internal projects both land as private repositories.
    pub fn is_private(&self) -> bool {
        self.visibility == "private" || self.visibility == "internal"
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SourceMember {
    pub id: u64,
    pub name: String,
    pub username: String,
    pub access_level: u32,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl From<SourceMember> for SourceUser {
    fn from(member: SourceMember) -> Self {
        Self {
            id: member.id,
            username: member.username,
            name: member.name,
            email: None,
            avatar_url: member.avatar_url,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SourceLabel {
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SourceMilestone {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub state: String,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserRef {
    pub id: u64,
    pub username: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MilestoneRef {
    pub title: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SourceIssue {
    pub id: u64,
    pub iid: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub state: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub milestone: Option<MilestoneRef>,
    #[serde(default)]
    pub assignee: Option<UserRef>,
    #[serde(default)]
    pub assignees: Vec<UserRef>,
    pub author: UserRef,
}

impl SourceIssue {
    pub fn is_closed(&self) -> bool {
        self.state == "closed"
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SourceNote {
    pub id: u64,
    pub body: String,
    pub author: UserRef,
    pub created_at: DateTime<Utc>,
    /// Notes generated by the source itself ("changed the milestone", ...).
    #[serde(default)]
    pub system: bool,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SourceVersion {
    pub version: String,
}

pub enum Membership {
    Group(SourceGroup),
    Project(SourceProject),
}

impl Membership {
    pub fn url_prefix(&self) -> &'static str {
        match self {
            Self::Group(_) => "groups",
            Self::Project(_) => "projects",
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Self::Group(x) => x.id,
            Self::Project(x) => x.id,
        }
    }

    pub fn key(&self) -> String {
        match self {
            Self::Group(x) => x.full_path.to_string(),
            Self::Project(x) => x.path_with_namespace.to_string(),
        }
    }
}
