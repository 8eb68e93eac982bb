use std::time::Duration;

use reqwest::{Client, Response};

use crate::error::{MigrationError, Result};

pub const USER_AGENT: &str = concat!("gitea-migrator/", env!("CARGO_PKG_VERSION"));

pub fn create_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(|e| MigrationError::Network(e.to_string()))
}

/// Turns a non-success response into an API error carrying the response text.
pub async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(MigrationError::Api {
        status: status.as_u16(),
        message,
    })
}
