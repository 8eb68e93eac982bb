use tracing::{info, warn};

use super::{Importer, RepoTarget};
use crate::context::{EntityKind, Outcome};
use crate::exists;
use crate::format::normalize_due_date;
use crate::gitea::{CreateMilestoneRequest, EditMilestoneRequest};
use crate::types::SourceMilestone;

/// Destination state of a source milestone; `active` becomes `open`.
pub fn milestone_state(source_state: &str) -> &'static str {
    match source_state {
        "closed" => "closed",
        _ => "open",
    }
}

impl Importer<'_> {
    pub async fn import_milestones(&self, milestones: &[SourceMilestone], target: &RepoTarget<'_>) {
        let owner = &target.owner.login;
        for milestone in milestones {
            let raw_due = milestone.due_date.as_deref().unwrap_or_default();
            let due_on = normalize_due_date(raw_due);
            if due_on.is_none() && !raw_due.trim().is_empty() {
                warn!(
                    "Unparseable due date {raw_due:?} on milestone {}, importing without one",
                    milestone.title
                );
            }
            let request = CreateMilestoneRequest {
                title: milestone.title.clone(),
                description: milestone.description.clone().unwrap_or_default(),
                due_on,
            };
            let key = format!("{} in {}", milestone.title, target.full_name());
            let outcome = self
                .ctx
                .upsert(
                    EntityKind::Milestone,
                    &key,
                    exists::milestone_exists(self.dest, owner, &target.name, &milestone.title),
                    self.dest.create_milestone(owner, &target.name, &request),
                )
                .await;

            // The state cannot be set on creation.
            let state = milestone_state(&milestone.state);
            if let Outcome::Created(created) = outcome {
                if state != "open" {
                    let update = EditMilestoneRequest {
                        state: state.to_string(),
                    };
                    match self
                        .dest
                        .update_milestone(owner, &target.name, created.id, &update)
                        .await
                    {
                        Ok(()) => info!("Milestone {key} updated to {state}!"),
                        Err(e) => self.ctx.fail(format!("Milestone {key} update failed: {e}")),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_milestone_state() {
        assert_eq!(milestone_state("active"), "open");
        assert_eq!(milestone_state("closed"), "closed");
        assert_eq!(milestone_state("anything"), "open");
    }
}
