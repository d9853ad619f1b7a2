//! Hytale account authentication for the Hytide launcher
//!
//! This crate implements the Authorization-Code-with-PKCE flow used to sign
//! a desktop user into their Hytale account, derive game-session
//! credentials from the resulting OAuth tokens, and keep the whole session
//! valid across launcher restarts.
//!
//! # Authentication Flow
//!
//! 1. Generate a PKCE verifier/challenge pair and an anti-CSRF state token
//! 2. Bind a loopback callback listener on an ephemeral port
//! 3. Open the authorization URL in the system browser
//! 4. Capture the authorization code from the browser redirect
//! 5. Exchange the code (plus verifier) for OAuth tokens
//! 6. Fetch the account's game profile
//! 7. Derive game session/identity tokens for that profile
//! 8. Persist the composed session to the per-user application directory
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ht_auth::{AuthClient, AuthConfig, AuthManager, FileSessionStore, LoginOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = AuthClient::new(AuthConfig::hytale())?;
//!     let store = Arc::new(FileSessionStore::new(
//!         FileSessionStore::default_storage_dir()?,
//!     ));
//!     let manager = AuthManager::new(client, store);
//!
//!     // Opens the system browser and waits for the redirect
//!     let session = manager.login_interactive(LoginOptions::default()).await?;
//!     println!("Logged in as: {}", session.username);
//!
//!     // Later: returns the stored session, refreshing it when expired
//!     let session = manager.valid_session().await?;
//!     println!("Game session token: {}", session.session_token);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Session Storage
//!
//! Sessions persist as an owner-only JSON file (no OS keyring involved, by
//! design: the file travels with the user profile and needs no unlock
//! prompt). The [`SessionStore`] trait is the seam; [`MemorySessionStore`]
//! backs tests.
//!
//! # Important Notes
//!
//! - Only one interactive login attempt runs per process at a time
//! - A failed refresh clears the stored session; the user must log in again
//! - Tokens should never be logged

pub mod browser;
pub mod callback;
pub mod client;
pub mod config;
pub mod errors;
pub mod file_store;
pub mod manager;
pub mod models;
pub mod pkce;
pub mod session;
pub mod store;

// Re-export main types
pub use client::AuthClient;
pub use config::AuthConfig;
pub use errors::{AuthError, Result};
pub use file_store::FileSessionStore;
pub use manager::{AuthManager, AuthStatus, LoginOptions, LoginStage};
pub use models::Profile;
pub use session::{GameSession, OAuthTokens, Session};
pub use store::{MemorySessionStore, SessionStore};
