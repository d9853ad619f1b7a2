use thiserror::Error;

/// Hytale authentication error types
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Random source failure: {0}")]
    Crypto(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Provider error {error}: {}", .description.as_deref().unwrap_or("no description"))]
    Provider {
        error: String,
        description: Option<String>,
    },

    /// The provider has not finished the user-facing part of the flow yet.
    /// Surfaced separately from terminal denials so callers can poll.
    #[error("Authorization pending - user has not completed the flow")]
    AuthorizationPending,

    #[error("HTTP error {status}: {body_snippet}")]
    Http {
        status: reqwest::StatusCode,
        body_snippet: String,
    },

    #[error("No playable profile on this account")]
    NoProfile,

    #[error("Stored session is unreadable: {0}")]
    SessionRead(String),

    #[error("No session found - login required")]
    LoginRequired,

    #[error("Session expired and refresh failed - please login again")]
    SessionExpired,

    #[error("Authentication timed out waiting for the browser redirect")]
    Timeout,

    #[error("Login cancelled")]
    Cancelled,

    #[error("Callback carried neither a code nor an error")]
    MissingCallbackCode,

    #[error("Failed to bind callback listener: {0}")]
    CallbackBind(#[source] std::io::Error),

    #[error("Failed to open system browser: {0}")]
    Browser(#[source] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session store lock is held by another process")]
    StoreLocked,

    #[error("Project directories are unavailable - unsupported OS or missing home directory")]
    ProjectDirectoriesUnavailable,
}

impl AuthError {
    /// Map a structured provider error body onto the taxonomy. The
    /// "authorization_pending" code is the one non-terminal provider
    /// response and gets its own variant.
    pub fn provider(error: impl Into<String>, description: Option<String>) -> Self {
        let error = error.into();
        if error == "authorization_pending" {
            return Self::AuthorizationPending;
        }
        Self::Provider { error, description }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_code_maps_to_distinct_variant() {
        let err = AuthError::provider("authorization_pending", None);
        assert!(matches!(err, AuthError::AuthorizationPending));
    }

    #[test]
    fn other_codes_stay_provider_errors() {
        let err = AuthError::provider("access_denied", Some("user said no".into()));
        match err {
            AuthError::Provider { error, description } => {
                assert_eq!(error, "access_denied");
                assert_eq!(description.as_deref(), Some("user said no"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
