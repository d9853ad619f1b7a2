use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Complete authenticated session: OAuth credentials, derived game-session
/// credentials, and the profile identity they were issued for.
///
/// This is the sole persisted entity. It is written fully populated or not
/// at all; refresh replaces it in place rather than patching fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Single source of truth for validity: always the earlier of the OAuth
    /// token lifetime and the game-session token lifetime.
    pub expires_at: DateTime<Utc>,
    pub session_token: String,
    pub identity_token: String,
    pub username: String,
    pub uuid: String,
    pub account_owner_id: String,
}

impl Session {
    /// Whether the session is usable without network calls.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expiry check against an explicit clock. The boundary is inclusive: a
    /// session whose expiry equals `now` is already expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Clamp the stored expiry down to `candidate` if it is earlier, so one
    /// expiry check governs both token families.
    pub fn clamp_expiry(&mut self, candidate: DateTime<Utc>) {
        if candidate < self.expires_at {
            self.expires_at = candidate;
        }
    }
}

/// OAuth token pair from the identity provider, before game-session
/// derivation. Transient; folded into [`Session`] by the orchestrator.
#[derive(Debug, Clone)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl OAuthTokens {
    pub fn new(access_token: String, refresh_token: String, expires_in: u64) -> Self {
        let expires_at = Utc::now() + chrono::Duration::seconds(expires_in as i64);
        Self {
            access_token,
            refresh_token,
            expires_at,
        }
    }
}

/// Short-lived game-server credentials derived from an access token.
#[derive(Debug, Clone)]
pub struct GameSession {
    pub session_token: String,
    pub identity_token: String,
    /// None when the provider's expiry field did not parse; the caller
    /// keeps the OAuth expiry in that case.
    pub expires_at: Option<DateTime<Utc>>,
}
