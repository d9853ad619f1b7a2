use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::browser;
use crate::callback::CallbackServer;
use crate::client::AuthClient;
use crate::errors::{AuthError, Result};
use crate::pkce;
use crate::session::Session;
use crate::store::SessionStore;

/// Stages of one interactive login attempt, strictly forward. A failure at
/// any stage aborts the attempt; there are no backward edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    GeneratingPkce,
    ServerStarting,
    AwaitingRedirect,
    ExchangingCode,
    FetchingProfile,
    DerivingGameSession,
    Persisted,
}

impl LoginStage {
    /// Human-readable progress line for the shell. A side-channel, not part
    /// of protocol correctness.
    pub fn message(&self) -> &'static str {
        match self {
            Self::GeneratingPkce => "Preparing secure login...",
            Self::ServerStarting => "Starting local callback listener...",
            Self::AwaitingRedirect => "Waiting for authorization in the browser...",
            Self::ExchangingCode => "Exchanging authorization code for tokens...",
            Self::FetchingProfile => "Fetching profile information...",
            Self::DerivingGameSession => "Creating game session...",
            Self::Persisted => "Login complete",
        }
    }
}

/// Snapshot of the stored session for the shell. Never triggers a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthStatus {
    pub logged_in: bool,
    pub expired: bool,
    pub username: Option<String>,
    pub uuid: Option<String>,
}

type ProgressSink = Box<dyn Fn(LoginStage) + Send + Sync>;
type UrlOpener = Box<dyn Fn(&str) -> Result<()> + Send + Sync>;

/// Knobs for one interactive login attempt. The defaults open the system
/// browser and report nothing; tests substitute both.
pub struct LoginOptions {
    /// Caller-driven abort, observed while waiting for the redirect
    pub cancel: CancellationToken,
    /// Progress notifications, one per stage transition
    pub progress: Option<ProgressSink>,
    /// Opens the authorization URL; defaults to the system browser
    pub open_url: UrlOpener,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            cancel: CancellationToken::new(),
            progress: None,
            open_url: Box::new(|url| browser::open_browser(url)),
        }
    }
}

/// Login orchestrator and session lifecycle owner.
///
/// Sequences PKCE generation, the loopback receiver, the browser redirect,
/// and the chained token exchanges, then persists the composed session.
/// Also owns expiry-driven refresh and logout.
pub struct AuthManager {
    client: AuthClient,
    store: Arc<dyn SessionStore>,
    /// Only one interactive attempt may be in flight per process; a second
    /// caller waits here instead of binding a second listener.
    login_guard: Mutex<()>,
}

impl AuthManager {
    pub fn new(client: AuthClient, store: Arc<dyn SessionStore>) -> Self {
        Self {
            client,
            store,
            login_guard: Mutex::new(()),
        }
    }

    /// Run the full interactive Authorization-Code-with-PKCE flow and
    /// persist the resulting session.
    #[instrument(skip(self, opts))]
    pub async fn login_interactive(&self, opts: LoginOptions) -> Result<Session> {
        let _attempt = self.login_guard.lock().await;

        emit(&opts.progress, LoginStage::GeneratingPkce);
        let verifier = pkce::new_verifier()?;
        let challenge = pkce::challenge_from(&verifier);

        // The listener must exist before the authorization URL, because the
        // assigned port rides inside the state parameter.
        emit(&opts.progress, LoginStage::ServerStarting);
        let (server, channels) = CallbackServer::bind().await?;
        let state_param = pkce::new_state_param(server.port())?;

        let auth_url = self.client.authorize_url(&challenge, &state_param);
        debug!("Opening authorization URL in browser");
        if let Err(e) = (opts.open_url)(&auth_url) {
            server.shutdown();
            return Err(e);
        }

        emit(&opts.progress, LoginStage::AwaitingRedirect);
        let timeout = self.client.config().interactive_timeout;
        let outcome = tokio::select! {
            _ = opts.cancel.cancelled() => Err(AuthError::Cancelled),
            err = channels.error => Err(err.unwrap_or(AuthError::MissingCallbackCode)),
            code = channels.code => code.map_err(|_| AuthError::MissingCallbackCode),
            _ = tokio::time::sleep(timeout) => Err(AuthError::Timeout),
        };

        // The receiver is torn down before the attempt concludes, on every
        // exit path. Drop would catch this too; shutting down explicitly
        // keeps the ordering obvious.
        server.shutdown();
        let code = outcome.inspect_err(|e| warn!("Login aborted while awaiting redirect: {e}"))?;

        emit(&opts.progress, LoginStage::ExchangingCode);
        let redirect_uri = self.client.config().redirect_uri.clone();
        let tokens = self
            .client
            .exchange_code(&code, &verifier, &redirect_uri)
            .await
            .inspect_err(|e| warn!("Token exchange failed: {e}"))?;

        emit(&opts.progress, LoginStage::FetchingProfile);
        let profiles = self
            .client
            .fetch_profiles(&tokens.access_token)
            .await
            .inspect_err(|e| warn!("Profile fetch failed: {e}"))?;
        let profile = profiles.profiles.first().ok_or(AuthError::NoProfile)?.clone();
        info!(username = %profile.username, "Authenticated profile selected");

        emit(&opts.progress, LoginStage::DerivingGameSession);
        let game = self
            .client
            .derive_game_session(&tokens.access_token, &profile.uuid)
            .await
            .inspect_err(|e| warn!("Game session derivation failed: {e}"))?;

        let mut session = Session {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.expires_at,
            session_token: game.session_token,
            identity_token: game.identity_token,
            username: profile.username,
            uuid: profile.uuid,
            account_owner_id: profiles.owner,
        };
        if let Some(game_expiry) = game.expires_at {
            session.clamp_expiry(game_expiry);
        }

        self.store.save(&session).await?;
        emit(&opts.progress, LoginStage::Persisted);

        Ok(session)
    }

    /// Delete the persisted session. Not having one is not an error.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        self.store.clear().await
    }

    /// Non-refreshing peek at the stored session, for shell display.
    pub async fn status(&self) -> AuthStatus {
        let session = match self.store.load().await {
            Ok(Some(session)) => session,
            Ok(None) => return AuthStatus::default(),
            Err(e) => {
                warn!("Failed to read stored session: {e}");
                return AuthStatus::default();
            }
        };

        if session.is_expired() {
            return AuthStatus {
                logged_in: false,
                expired: true,
                ..AuthStatus::default()
            };
        }

        AuthStatus {
            logged_in: true,
            expired: false,
            username: Some(session.username),
            uuid: Some(session.uuid),
        }
    }

    /// Return a usable session, refreshing and re-deriving game credentials
    /// if the stored one has expired.
    ///
    /// A failed refresh clears the store so a stale, unrefreshable session
    /// never lingers; the caller must prompt for an interactive login.
    #[instrument(skip(self))]
    pub async fn valid_session(&self) -> Result<Session> {
        let session = self.store.load().await?.ok_or(AuthError::LoginRequired)?;

        if !session.is_expired() {
            return Ok(session);
        }

        info!("Session expired, attempting to refresh");
        match self.refresh_session(&session).await {
            Ok(refreshed) => {
                self.store.save(&refreshed).await?;
                Ok(refreshed)
            }
            Err(e) => {
                warn!("Refresh failed ({e}), clearing stored session");
                if let Err(clear_err) = self.store.clear().await {
                    warn!("Failed to clear stale session: {clear_err}");
                }
                Err(AuthError::SessionExpired)
            }
        }
    }

    /// Rebuild a full session from a refresh token: new OAuth tokens, then
    /// fresh game-session credentials. Identity fields carry over; derived
    /// tokens are always recreated, never refreshed independently.
    async fn refresh_session(&self, session: &Session) -> Result<Session> {
        let tokens = self
            .client
            .refresh_access_token(&session.refresh_token)
            .await?;
        let game = self
            .client
            .derive_game_session(&tokens.access_token, &session.uuid)
            .await?;

        let mut refreshed = Session {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.expires_at,
            session_token: game.session_token,
            identity_token: game.identity_token,
            username: session.username.clone(),
            uuid: session.uuid.clone(),
            account_owner_id: session.account_owner_id.clone(),
        };
        if let Some(game_expiry) = game.expires_at {
            refreshed.clamp_expiry(game_expiry);
        }

        Ok(refreshed)
    }
}

fn emit(progress: &Option<ProgressSink>, stage: LoginStage) {
    debug!(stage = ?stage, "{}", stage.message());
    if let Some(sink) = progress {
        sink(stage);
    }
}
