//! Session state and its durable store.
//!
//! The session is the bearer token plus a minimal user profile. It has
//! exactly two transitions: [`SessionState::sign_in`] and teardown (sign-out
//! or a 401). Every transition bumps an epoch; requests capture the epoch
//! alongside the token, and a 401 only tears down the session it was issued
//! under. That makes teardown idempotent when several requests fail at once.

use hearken_core::User;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

impl Session {
    pub fn new(token: impl Into<String>, user: User) -> Self {
        Self {
            token: token.into(),
            user,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user", &self.user.id)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Durable client-local storage for the session.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<Session>, SessionStoreError>;
    fn save(&self, session: &Session) -> Result<(), SessionStoreError>;
    fn clear(&self) -> Result<(), SessionStoreError>;
}

/// Session persisted as a JSON file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>, SessionStoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let session = serde_json::from_str::<Session>(&contents)?;
        Ok(Some(session))
    }

    fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>, SessionStoreError> {
        Ok(self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Token and epoch captured when a request is dispatched.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: Option<String>,
    pub epoch: u64,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("epoch", &self.epoch)
            .finish()
    }
}

#[derive(Debug, Default)]
struct SessionInner {
    session: Option<Session>,
    epoch: u64,
}

/// Process-wide session state, injected into the request pipeline.
pub struct SessionState {
    store: Arc<dyn SessionStore>,
    inner: RwLock<SessionInner>,
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("SessionState")
            .field("authenticated", &inner.session.is_some())
            .field("epoch", &inner.epoch)
            .finish()
    }
}

impl SessionState {
    /// Start signed out, ignoring whatever the store holds.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            inner: RwLock::new(SessionInner::default()),
        }
    }

    /// Start from the durable session, if any.
    pub fn restore(store: Arc<dyn SessionStore>) -> Result<Self, SessionStoreError> {
        let session = store.load()?;
        if session.is_some() {
            tracing::debug!("restored durable session");
        }
        Ok(Self {
            store,
            inner: RwLock::new(SessionInner { session, epoch: 0 }),
        })
    }

    /// Persist and activate a session. Returns the new epoch.
    pub fn sign_in(&self, session: Session) -> Result<u64, SessionStoreError> {
        self.store.save(&session)?;
        let mut inner = self.write();
        inner.session = Some(session);
        inner.epoch += 1;
        Ok(inner.epoch)
    }

    /// Explicit sign-out. Always clears in-memory state, then the store.
    pub fn sign_out(&self) -> Result<(), SessionStoreError> {
        {
            let mut inner = self.write();
            inner.session = None;
            inner.epoch += 1;
        }
        self.store.clear()
    }

    /// Tear down after a 401, but only if no transition happened since
    /// `epoch` was captured. Returns whether this call performed it.
    pub fn teardown_if_current(&self, epoch: u64) -> bool {
        {
            let mut inner = self.write();
            if inner.epoch != epoch {
                return false;
            }
            inner.session = None;
            inner.epoch += 1;
        }
        if let Err(err) = self.store.clear() {
            tracing::warn!(error = %err, "failed to clear durable session");
        }
        true
    }

    pub fn credential(&self) -> Credential {
        let inner = self.read();
        Credential {
            token: inner.session.as_ref().map(|s| s.token.clone()),
            epoch: inner.epoch,
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.read().session.as_ref().map(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().session.is_some()
    }

    pub fn epoch(&self) -> u64 {
        self.read().epoch
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SessionInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SessionInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearken_core::{EntityIdType, UserId, UserRole};

    fn session() -> Session {
        Session::new(
            "token-abc",
            User {
                id: UserId::now_v7(),
                email: "admin@example.edu".to_string(),
                name: "Dana Admin".to_string(),
                role: UserRole::Admin,
                department_id: None,
            },
        )
    }

    #[test]
    fn test_teardown_happens_once_per_epoch() {
        let store = Arc::new(MemorySessionStore::new());
        let state = SessionState::new(store.clone());
        state.sign_in(session()).unwrap();

        let captured = state.credential();
        assert_eq!(captured.token.as_deref(), Some("token-abc"));

        assert!(state.teardown_if_current(captured.epoch));
        assert!(!state.teardown_if_current(captured.epoch));
        assert!(!state.is_authenticated());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_stale_401_does_not_end_newer_session() {
        let state = SessionState::new(Arc::new(MemorySessionStore::new()));
        let before = state.credential();
        state.sign_in(session()).unwrap();

        assert!(!state.teardown_if_current(before.epoch));
        assert!(state.is_authenticated());
    }

    #[test]
    fn test_debug_never_prints_token() {
        let rendered = format!("{:?} {:?}", session(), Credential {
            token: Some("token-abc".to_string()),
            epoch: 3,
        });
        assert!(!rendered.contains("token-abc"));
    }
}
