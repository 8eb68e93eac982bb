//! Error types for migration operations.

use thiserror::Error;

/// Migration-specific errors.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Missing or malformed configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Token rejected by the source or destination.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Entity shape the migration cannot carry over.
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl MigrationError {
    /// HTTP status carried by an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

impl From<reqwest::Error> for MigrationError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Api {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => Self::Network(err.to_string()),
        }
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_helpers() {
        let err = MigrationError::Api {
            status: 404,
            message: "not found".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_forbidden());

        let err = MigrationError::Api {
            status: 403,
            message: "forbidden".to_string(),
        };
        assert!(err.is_forbidden());
        assert_eq!(err.status(), Some(403));

        assert_eq!(MigrationError::Network("reset".to_string()).status(), None);
    }

    #[test]
    fn test_api_error_display_carries_response_text() {
        let err = MigrationError::Api {
            status: 422,
            message: "{\"message\":\"name already taken\"}".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API error (422): {\"message\":\"name already taken\"}"
        );
    }
}
