use std::sync::{Arc, RwLock};

use crate::errors::{AuthError, Result};
use crate::session::Session;

/// Persistence seam for the single on-disk session.
///
/// `load` distinguishes "never logged in" (`Ok(None)`) from corrupt state
/// (`Err(SessionRead)`); `clear` is idempotent.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<Session>>;

    async fn save(&self, session: &Session) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// In-memory session store for tests and simple embedding
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    session: Arc<RwLock<Option<Session>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<Session>> {
        self.session
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| AuthError::SessionRead("lock poisoned".to_string()))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        *self
            .session
            .write()
            .map_err(|_| AuthError::SessionRead("lock poisoned".to_string()))? =
            Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self
            .session
            .write()
            .map_err(|_| AuthError::SessionRead("lock poisoned".to_string()))? = None;
        Ok(())
    }
}
