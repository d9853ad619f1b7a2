use serde::{Deserialize, Serialize};

/// Token endpoint response (both authorization_code and refresh_token grants)
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Structured error body from the token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// One playable identity on the account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub uuid: String,
    pub username: String,
}

/// Account-data endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct ProfilesResponse {
    pub owner: String,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

/// Game-session endpoint request body
#[derive(Debug, Clone, Serialize)]
pub struct GameSessionRequest {
    pub uuid: String,
}

/// Game-session endpoint response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSessionResponse {
    pub session_token: String,
    pub identity_token: String,
    /// RFC 3339 timestamp; best-effort metadata, parsed leniently
    pub expires_at: String,
}
