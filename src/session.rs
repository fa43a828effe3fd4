//! Server-side session state.
//!
//! Each session is keyed by an opaque identifier and caches a denormalized
//! [`User`] snapshot. Reads never touch the credential store; mutation flows
//! repair staleness through [`SessionManager::refresh`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::RngCore;
use tokio::sync::RwLock;

use crate::user::User;

struct Entry {
    user: User,
    expires_at: Instant,
}

/// In-memory session store keyed by opaque hex identifiers.
#[derive(Clone)]
pub struct SessionManager {
    ttl: Duration,
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

impl SessionManager {
    /// Create a new [`SessionManager`] with the given idle lifetime.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Open a session for an authenticated user and return its identifier.
    ///
    /// Called only after successful credential verification.
    pub async fn start(&self, user: User) -> String {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let id = hex::encode(bytes);

        let entry = Entry {
            user,
            expires_at: Instant::now() + self.ttl,
        };
        self.inner.write().await.insert(id.clone(), entry);

        id
    }

    /// Return the cached snapshot, or `None` when the session is absent or
    /// expired. Expired entries are dropped on the way out.
    pub async fn read(&self, id: &str) -> Option<User> {
        {
            let sessions = self.inner.read().await;
            match sessions.get(id) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.user.clone());
                },
                Some(_) => {},
                None => return None,
            }
        }

        // Entry outlived its TTL.
        self.inner.write().await.remove(id);
        None
    }

    /// Overwrite the cached snapshot with a freshly loaded record.
    ///
    /// The identifier does not change. Returns `false` when the session
    /// disappeared in the meantime; callers log a warning, the credential
    /// store write already stands.
    pub async fn refresh(&self, id: &str, user: User) -> bool {
        let mut sessions = self.inner.write().await;
        match sessions.get_mut(id) {
            Some(entry) if entry.expires_at > Instant::now() => {
                entry.user = user;
                entry.expires_at = Instant::now() + self.ttl;
                true
            },
            _ => false,
        }
    }

    /// Remove all state tied to `id`. Idempotent.
    pub async fn terminate(&self, id: &str) {
        self.inner.write().await.remove(id);
    }
}
