use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, instrument, warn};

use crate::config::AuthConfig;
use crate::errors::{AuthError, Result};
use crate::models::{
    GameSessionRequest, GameSessionResponse, ProfilesResponse, TokenErrorResponse, TokenResponse,
};
use crate::session::{GameSession, OAuthTokens};

/// HTTP client for the identity provider's token, account-data, and
/// game-session endpoints.
#[derive(Debug, Clone)]
pub struct AuthClient {
    config: AuthConfig,
    http: Client,
}

impl AuthClient {
    /// Create a new authentication client
    pub fn new(config: AuthConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.http_timeouts.connect)
            .timeout(config.http_timeouts.request)
            .user_agent(config.user_agent.as_deref().unwrap_or("hytide"))
            .build()?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Build the authorization URL for the browser.
    ///
    /// The provider's client validation is sensitive to query parameter
    /// ordering, so the query is assembled literally instead of through a
    /// generic encoder (which would sort alphabetically).
    pub fn authorize_url(&self, code_challenge: &str, state_param: &str) -> String {
        fn escape(value: &str) -> String {
            url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
        }

        format!(
            "{}?access_type=offline&client_id={}&code_challenge={}&code_challenge_method=S256&redirect_uri={}&response_type=code&scope={}&state={}",
            self.config.authorize_url,
            escape(&self.config.client_id),
            escape(code_challenge),
            escape(&self.config.redirect_uri),
            escape(&self.config.scope),
            escape(state_param),
        )
    }

    /// Exchange an authorization code (plus its PKCE verifier) for tokens.
    /// `redirect_uri` must be byte-identical to the one in the
    /// authorization request.
    #[instrument(skip(self, code, verifier))]
    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> Result<OAuthTokens> {
        debug!("Exchanging authorization code for tokens");
        self.token_grant(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", &self.config.client_id),
            ("code_verifier", verifier),
        ])
        .await
    }

    /// Obtain a fresh token pair from a refresh token. No verifier is
    /// involved on this grant.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens> {
        debug!("Refreshing access token");
        self.token_grant(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.config.client_id),
        ])
        .await
    }

    async fn token_grant(&self, form: &[(&str, &str)]) -> Result<OAuthTokens> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<TokenErrorResponse>(&body) {
                return Err(AuthError::provider(err.error, err.error_description));
            }
            return Err(AuthError::Http {
                status,
                body_snippet: body.chars().take(200).collect(),
            });
        }

        let tokens: TokenResponse = serde_json::from_str(&body)?;
        Ok(OAuthTokens::new(
            tokens.access_token,
            tokens.refresh_token,
            tokens.expires_in,
        ))
    }

    /// Fetch the account's game profiles and owner id.
    #[instrument(skip(self, access_token))]
    pub async fn fetch_profiles(&self, access_token: &str) -> Result<ProfilesResponse> {
        debug!("Fetching launcher profile data");
        let response = self
            .http
            .get(&self.config.launcher_data_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Http {
                status,
                body_snippet: body.chars().take(200).collect(),
            });
        }

        Ok(response.json().await?)
    }

    /// Derive game-server credentials for one profile from an access token.
    ///
    /// The provider's expiry field is best-effort metadata: when it fails
    /// to parse, the derived tokens are still returned and the caller keeps
    /// the OAuth expiry unchanged.
    #[instrument(skip(self, access_token))]
    pub async fn derive_game_session(&self, access_token: &str, uuid: &str) -> Result<GameSession> {
        debug!("Requesting new game session");
        let response = self
            .http
            .post(&self.config.game_session_url)
            .bearer_auth(access_token)
            .json(&GameSessionRequest {
                uuid: uuid.to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Http {
                status,
                body_snippet: body.chars().take(200).collect(),
            });
        }

        let session: GameSessionResponse = response.json().await?;
        let expires_at = match DateTime::parse_from_rfc3339(&session.expires_at) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(e) => {
                warn!("Failed to parse game session expiry '{}': {e}", session.expires_at);
                None
            }
        };

        Ok(GameSession {
            session_token: session.session_token,
            identity_token: session.identity_token,
            expires_at,
        })
    }
}
