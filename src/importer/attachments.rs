use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{info, warn};

use super::{Importer, RepoTarget};
use crate::error::Result;
use crate::gitea::{AssetTarget, GiteaAttachment};
use crate::rewrite::{find_uploads, replace_upload, upload_file_name};

impl Importer<'_> {
    /// Moves every upload referenced by `body` from the source project to the
    /// already created issue or comment and returns the body with the new
    /// asset URLs. Uploads that fail keep their original link.
    pub async fn rehost_attachments(
        &self,
        target: &RepoTarget<'_>,
        asset_target: AssetTarget,
        body: &str,
    ) -> String {
        let mut rewritten = body.to_string();
        for upload_path in find_uploads(body) {
            match self.rehost_upload(target, asset_target, &upload_path).await {
                Ok(url) => {
                    info!("Attachment {upload_path} re-hosted as {url}");
                    rewritten = replace_upload(&rewritten, &upload_path, &url);
                }
                Err(e) => self.ctx.fail(format!(
                    "Attachment {upload_path} of {} failed: {e}",
                    target.full_name()
                )),
            }
        }
        rewritten
    }

    async fn rehost_upload(
        &self,
        target: &RepoTarget<'_>,
        asset_target: AssetTarget,
        upload_path: &str,
    ) -> Result<String> {
        let bytes = self
            .source
            .download_upload(target.project_id, upload_path)
            .await?;
        let file_name = upload_file_name(upload_path);
        let scratch = self.scratch_path(target.project_id, upload_path);
        if let Some(parent) = scratch.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // The scratch file is removed whichever step fails.
        let uploaded: Result<GiteaAttachment> = async {
            tokio::fs::write(&scratch, &bytes).await?;
            let contents = tokio::fs::read(&scratch).await?;
            self.dest
                .upload_asset(
                    &asset_target,
                    &target.owner.login,
                    &target.name,
                    &file_name,
                    contents,
                )
                .await
        }
        .await;
        match tokio::fs::remove_file(&scratch).await {
            Err(e) if e.kind() != ErrorKind::NotFound => {
                warn!("Failed to remove scratch file {}: {e}", scratch.display())
            }
            _ => {}
        }
        Ok(uploaded?.browser_download_url)
    }

    /// `<scratch>/<project>-<secret>-<file name>`, unique per upload.
    fn scratch_path(&self, project_id: u64, upload_path: &str) -> PathBuf {
        let flattened = upload_path
            .trim_start_matches("/uploads/")
            .replace('/', "-");
        self.ctx
            .config
            .scratch_dir
            .join(format!("{project_id}-{flattened}"))
    }
}
