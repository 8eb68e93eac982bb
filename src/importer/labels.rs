use super::{Importer, RepoTarget};
use crate::context::EntityKind;
use crate::exists;
use crate::gitea::CreateLabelRequest;
use crate::types::SourceLabel;

impl Importer<'_> {
    /// Project labels go to the repository unless the repository or its
    /// organization already carries a label of that name.
    pub async fn import_labels(&self, labels: &[SourceLabel], target: &RepoTarget<'_>) {
        let owner = &target.owner.login;
        for label in labels {
            let request = CreateLabelRequest {
                name: label.name.clone(),
                color: label.color.clone(),
                description: label.description.clone().unwrap_or_default(),
            };
            self.ctx
                .upsert(
                    EntityKind::Label,
                    &format!("{} in {}", label.name, target.full_name()),
                    exists::label_exists(
                        self.dest,
                        owner,
                        &target.name,
                        target.owner.org(),
                        &label.name,
                    ),
                    self.dest.create_repo_label(owner, &target.name, &request),
                )
                .await;
        }
    }
}
