use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use base64::Engine;
use rand::Rng;
use tracing::{info, warn};

use super::Importer;
use crate::context::EntityKind;
use crate::error::Result;
use crate::exists;
use crate::gitea::{CreateKeyRequest, CreateUserRequest, UpdateAvatarRequest};
use crate::types::{SourceKey, SourceUser};

const PASSWORD_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Temporary password handed to a created user; must be changed on first login.
pub fn temporary_password() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..10)
        .map(|_| PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())] as char)
        .collect();
    format!("Tmp1!{suffix}")
}

fn fallback_email(user: &SourceUser) -> String {
    user.email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}@noemail-git.local", user.username))
}

/// Appends `username,password` to the operator hand-off file.
fn record_password(path: &Path, username: &str, password: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{username},{password}")?;
    Ok(())
}

impl Importer<'_> {
    pub async fn import_users(&self, users: &[SourceUser]) {
        info!("Importing {} users", users.len());
        for user in users {
            self.import_user(user).await;
        }
    }

    async fn import_user(&self, user: &SourceUser) {
        let keys = match self.source.fetch_user_keys(user.id).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Failed to load public keys of {}: {e}", user.username);
                vec![]
            }
        };
        info!(
            "Importing user {} with {} public keys",
            user.username,
            keys.len()
        );

        let password = temporary_password();
        let request = CreateUserRequest {
            email: fallback_email(user),
            full_name: user.name.clone(),
            login_name: user.username.clone(),
            password: password.clone(),
            must_change_password: true,
            send_notify: self.ctx.config.notify_users,
            source_id: 0,
            username: user.username.clone(),
        };
        let outcome = self
            .ctx
            .upsert(
                EntityKind::User,
                &user.username,
                exists::user_exists(self.dest, &user.username),
                self.dest.create_user(&request),
            )
            .await;

        if outcome.is_created() {
            match record_password(&self.ctx.config.password_file, &user.username, &password) {
                Ok(()) => info!(
                    "Temporary password of {} written to {}",
                    user.username,
                    self.ctx.config.password_file.display()
                ),
                Err(e) => self.ctx.fail(format!(
                    "Failed to record temporary password of {}: {e}",
                    user.username
                )),
            }
            self.import_avatar(user).await;
        }

        for key in &keys {
            self.import_user_key(user, key).await;
        }
    }

    async fn import_avatar(&self, user: &SourceUser) {
        let Some(avatar_url) = user.avatar_url.as_deref().filter(|u| !u.is_empty()) else {
            return;
        };
        let bytes = match self.source.download_avatar(avatar_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to download avatar of {}: {e}", user.username);
                return;
            }
        };
        let request = UpdateAvatarRequest {
            image: base64::engine::general_purpose::STANDARD.encode(bytes),
        };
        match self.dest.update_user_avatar(&user.username, &request).await {
            Ok(()) => info!("Avatar of {} imported!", user.username),
            Err(e) => self
                .ctx
                .fail(format!("Avatar of {} import failed: {e}", user.username)),
        }
    }

    async fn import_user_key(&self, user: &SourceUser, key: &SourceKey) {
        let request = CreateKeyRequest {
            key: key.key.clone(),
            read_only: true,
            title: key.title.clone(),
        };
        self.ctx
            .upsert(
                EntityKind::UserKey,
                &format!("{} of {}", key.title, user.username),
                exists::user_key_exists(self.dest, &user.username, &key.title),
                self.dest.create_user_key(&user.username, &request),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_password_shape() {
        let password = temporary_password();
        assert!(password.starts_with("Tmp1!"));
        assert_eq!(password.len(), 15);
        assert!(password[5..]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_fallback_email() {
        let mut user = SourceUser {
            id: 1,
            username: "alice".to_string(),
            name: "Alice".to_string(),
            email: None,
            avatar_url: None,
        };
        assert_eq!(fallback_email(&user), "alice@noemail-git.local");
        user.email = Some(" ".to_string());
        assert_eq!(fallback_email(&user), "alice@noemail-git.local");
        user.email = Some("alice@example.com".to_string());
        assert_eq!(fallback_email(&user), "alice@example.com");
    }

    #[test]
    fn test_record_password_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/passwords.csv");
        record_password(&path, "alice", "Tmp1!AAAAAAAAAA").unwrap();
        record_password(&path, "bob", "Tmp1!BBBBBBBBBB").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "alice,Tmp1!AAAAAAAAAA\nbob,Tmp1!BBBBBBBBBB\n");
    }
}
