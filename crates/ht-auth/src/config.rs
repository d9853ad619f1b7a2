use std::time::Duration;

/// Hytale identity provider endpoints, as used by the official launcher.
pub mod endpoints {
    pub const AUTHORIZE: &str = "https://oauth.accounts.hytale.com/oauth2/auth";
    pub const TOKEN: &str = "https://oauth.accounts.hytale.com/oauth2/token";
    pub const LAUNCHER_DATA: &str = "https://account-data.hytale.com/my-account/get-launcher-data";
    pub const GAME_SESSION: &str = "https://sessions.hytale.com/game-session/new";
}

/// Public client id registered for the official launcher.
pub const CLIENT_ID: &str = "hytale-launcher";

/// Redirect URI registered with the provider. The provider redirects here
/// first; its consent page then forwards to the local callback port carried
/// in the state parameter.
pub const REDIRECT_URI: &str = "https://accounts.hytale.com/consent/client";

/// OAuth scopes requested for launcher logins.
pub const SCOPE: &str = "openid offline auth:launcher";

/// Path the loopback receiver serves.
pub const CALLBACK_PATH: &str = "/authorization-callback";

/// Wall-clock limit on the interactive browser round trip.
pub const INTERACTIVE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            request: Duration::from_secs(30),
        }
    }
}

/// Configuration for [`AuthClient`](crate::client::AuthClient)
///
/// Endpoint URLs are plain fields so tests can point the client at a local
/// double; [`AuthConfig::hytale`] fills in the production values.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// OAuth client id sent with every grant
    pub client_id: String,

    /// Authorization endpoint opened in the browser
    pub authorize_url: String,

    /// Token endpoint for code and refresh grants
    pub token_url: String,

    /// Account-data endpoint listing game profiles
    pub launcher_data_url: String,

    /// Game-session derivation endpoint
    pub game_session_url: String,

    /// Redirect URI, byte-identical between the authorization request and
    /// the code exchange (the provider validates equality)
    pub redirect_uri: String,

    /// Space-joined OAuth scopes
    pub scope: String,

    /// HTTP client timeouts
    pub http_timeouts: HttpTimeouts,

    /// Custom user agent (optional)
    pub user_agent: Option<String>,

    /// Overall limit on one interactive login attempt
    pub interactive_timeout: Duration,
}

impl AuthConfig {
    /// Create config for the official Hytale account flow
    pub fn hytale() -> Self {
        Self {
            client_id: CLIENT_ID.to_string(),
            authorize_url: endpoints::AUTHORIZE.to_string(),
            token_url: endpoints::TOKEN.to_string(),
            launcher_data_url: endpoints::LAUNCHER_DATA.to_string(),
            game_session_url: endpoints::GAME_SESSION.to_string(),
            redirect_uri: REDIRECT_URI.to_string(),
            scope: SCOPE.to_string(),
            http_timeouts: HttpTimeouts::default(),
            user_agent: Some("hytide".to_string()),
            interactive_timeout: INTERACTIVE_TIMEOUT,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::hytale()
    }
}
