use tracing::{info, warn};

use super::Importer;
use crate::context::EntityKind;
use crate::exists;
use crate::format::clean_name;
use crate::gather::{Gathered, GroupBundle};
use crate::gitea::{CreateLabelRequest, CreateOrgRequest};
use crate::types::{SourceLabel, SourceMember};

impl Importer<'_> {
    pub async fn import_groups(&self, groups: &[Gathered<GroupBundle>]) {
        info!("Importing {} groups", groups.len());
        for gathered in groups {
            let bundle = match gathered {
                Gathered::Complete(bundle) => bundle,
                Gathered::Partial { value, reason } => {
                    warn!("Group {} gathered partially: {reason}", value.group.full_path);
                    value
                }
                Gathered::Skipped { reason } => {
                    warn!("Skipping group: {reason}");
                    continue;
                }
            };
            self.import_group(bundle).await;
        }
    }

    async fn import_group(&self, bundle: &GroupBundle) {
        let group = &bundle.group;
        let org = clean_name(&group.name);
        info!("Importing group {org}");

        let request = CreateOrgRequest {
            username: org.clone(),
            full_name: group.full_name.clone().unwrap_or_else(|| group.name.clone()),
            description: group.description.clone().unwrap_or_default(),
            location: String::new(),
            website: String::new(),
        };
        self.ctx
            .upsert(
                EntityKind::Organization,
                &org,
                exists::organization_exists(self.dest, &org),
                self.dest.create_org(&request),
            )
            .await;

        self.import_group_members(&org, bundle.members.as_deref())
            .await;
        for label in &bundle.labels {
            self.import_group_label(&org, label).await;
        }
    }

    /// Puts every group member into the organization's first team.
    async fn import_group_members(&self, org: &str, members: Option<&[SourceMember]>) {
        // TODO: one team per source access level instead of a single catch-all team.
        let usernames: Vec<String> = match members {
            Some(members) => members.iter().map(|m| m.username.clone()).collect(),
            None => match &self.ctx.config.fallback_member {
                Some(fallback) => {
                    warn!("Members of {org} unknown, adding fallback member {fallback}");
                    vec![fallback.clone()]
                }
                None => {
                    self.ctx.fail(format!(
                        "Members of {org} unknown and no fallback member configured"
                    ));
                    return;
                }
            },
        };

        let teams = match self.dest.fetch_org_teams(org).await {
            Ok(teams) => teams,
            Err(e) => {
                self.ctx
                    .fail(format!("Failed to load teams of organization {org}: {e}"));
                return;
            }
        };
        let Some(team) = teams.first() else {
            self.ctx
                .fail(format!("Failed to import members to {org}: no teams found!"));
            return;
        };
        info!(
            "Importing {} members of {org} into team {}",
            usernames.len(),
            team.name
        );

        for username in &usernames {
            self.ctx
                .upsert(
                    EntityKind::TeamMember,
                    &format!("{username} in {org}/{}", team.name),
                    exists::team_member_exists(self.dest, team.id, username),
                    self.dest.add_team_member(team.id, username),
                )
                .await;
        }
    }

    async fn import_group_label(&self, org: &str, label: &SourceLabel) {
        let request = CreateLabelRequest {
            name: label.name.clone(),
            color: label.color.clone(),
            description: label.description.clone().unwrap_or_default(),
        };
        self.ctx
            .upsert(
                EntityKind::Label,
                &format!("{} in {org}", label.name),
                exists::org_label_exists(self.dest, org, &label.name),
                self.dest.create_org_label(org, &request),
            )
            .await;
    }
}
