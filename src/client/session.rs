use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::types::{TokenPair, User, default_token_type};

/// The token pair a client is currently acting with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

impl Session {
    pub fn bearer(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: default_token_type(),
        }
    }
}

impl From<TokenPair> for Session {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: pair.token_type,
        }
    }
}

/// Told when the session is dropped, e.g. to send the user back to login.
pub trait SessionObserver: Send + Sync {
    fn session_cleared(&self);
}

impl<F> SessionObserver for F
where
    F: Fn() + Send + Sync,
{
    fn session_cleared(&self) {
        self()
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Snapshot {
    session: Option<Session>,
    user: Option<User>,
}

struct StoreInner {
    snapshot: RwLock<Snapshot>,
    observers: RwLock<Vec<Arc<dyn SessionObserver>>>,
    path: Option<PathBuf>,
}

/// Shared, cloneable handle on the session.
///
/// Every clone sees the same state. Updates replace the whole session at
/// once, so readers never observe a new access token paired with an old
/// refresh token. When backed by a file, each change is written through.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<StoreInner>,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl TokenStore {
    pub fn in_memory() -> Self {
        Self::with_snapshot(Snapshot::default(), None)
    }

    /// Restore from `path` if it holds a saved session; an unreadable file
    /// starts an empty session instead of failing.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let snapshot = match load_snapshot(&path) {
            Ok(Some(s)) => {
                info!(path = %path.display(), "restored saved session");
                s
            }
            Ok(None) => Snapshot::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable session file");
                Snapshot::default()
            }
        };
        Self::with_snapshot(snapshot, Some(path))
    }

    fn with_snapshot(snapshot: Snapshot, path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                snapshot: RwLock::new(snapshot),
                observers: RwLock::new(Vec::new()),
                path,
            }),
        }
    }

    pub fn subscribe(&self, observer: impl SessionObserver + 'static) {
        self.inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(observer));
    }

    pub fn session(&self) -> Option<Session> {
        self.read().session.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read()
            .session
            .as_ref()
            .map(|s| s.access_token.clone())
            .filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read()
            .session
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .filter(|t| !t.is_empty())
    }

    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// Swap in a new token pair.
    pub fn replace(&self, session: impl Into<Session>) {
        let session = session.into();
        let snapshot = {
            let mut guard = self.write();
            guard.session = Some(session);
            guard.clone()
        };
        debug!("session tokens replaced");
        self.persist(&snapshot);
    }

    pub fn set_user(&self, user: Option<User>) {
        let snapshot = {
            let mut guard = self.write();
            guard.user = user;
            guard.clone()
        };
        self.persist(&snapshot);
    }

    /// Forget tokens and user. Observers run only if a session was actually
    /// held, so racing clears notify once. Returns whether anything was removed.
    pub fn clear(&self) -> bool {
        let had_session = {
            let mut guard = self.write();
            let had = guard.session.is_some();
            *guard = Snapshot::default();
            had
        };
        self.persist(&Snapshot::default());
        if had_session {
            info!("session cleared");
            let observers = self
                .inner
                .observers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            for observer in observers {
                observer.session_cleared();
            }
        }
        had_session
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Snapshot> {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Snapshot> {
        self.inner
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, snapshot: &Snapshot) {
        let Some(path) = self.inner.path.as_deref() else {
            return;
        };
        if let Err(e) = save_snapshot(path, snapshot) {
            warn!(path = %path.display(), error = %e, "failed to persist session");
        }
    }
}

fn load_snapshot(path: &Path) -> std::io::Result<Option<Snapshot>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn save_snapshot(path: &Path, snapshot: &Snapshot) -> std::io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
    fs::rename(tmp, path)
}
