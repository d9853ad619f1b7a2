use crate::errors::{AuthError, Result};

/// Open a URL in the system's default browser, detached so the launcher
/// never inherits the browser process.
pub fn open_browser(url: &str) -> Result<()> {
    open::that_detached(url).map_err(AuthError::Browser)
}
