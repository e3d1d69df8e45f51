//! Session identity: cookie plumbing, the validator seam, and an in-memory
//! store.
//!
//! The session filter only ever talks to the [`SessionValidator`] trait, so
//! an application can back sessions however it likes; [`MemorySessionStore`]
//! is the stock implementation: random ids, a TTL, nothing persisted.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::http::Headers;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "sid";

/// A live, validated session.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    user: String,
    expires_at: Instant,
}

impl Session {
    /// The opaque session id, as carried in the cookie.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The user this session was created for.
    pub fn user(&self) -> &str {
        &self.user
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// The seam the session filter authenticates through.
///
/// `validate` answers whether `session_id` names a live session, returning
/// the session when it does. Implementations are shared across connections
/// and must be `Send + Sync`.
pub trait SessionValidator: Send + Sync {
    /// Resolves a session id to a live session, or `None` if the id is
    /// unknown or the session has lapsed.
    fn validate(&self, session_id: &str) -> Option<Session>;
}

/// In-memory session store with per-session expiry.
///
/// Sessions live behind a [`Mutex`]; every operation takes the lock briefly
/// and never holds it across an await point. Expired entries are dropped
/// lazily: the first `validate` after expiry removes the entry.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use portcullis::session::{MemorySessionStore, SessionValidator};
///
/// let store = MemorySessionStore::new(Duration::from_secs(1800));
/// let session = store.create("mina");
/// assert!(store.validate(session.id()).is_some());
///
/// store.remove(session.id());
/// assert!(store.validate(session.id()).is_none());
/// ```
pub struct MemorySessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemorySessionStore {
    /// Creates a store whose sessions last `ttl` from creation.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a session for `user` and returns it. The id is a fresh
    /// random UUID.
    pub fn create(&self, user: &str) -> Session {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user: user.to_owned(),
            expires_at: Instant::now() + self.ttl,
        };
        self.sessions
            .lock()
            .expect("session store mutex poisoned")
            .insert(session.id.clone(), session.clone());
        session
    }

    /// Removes a session. Returns `true` when it existed.
    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .expect("session store mutex poisoned")
            .remove(session_id)
            .is_some()
    }

    /// Number of sessions currently held, expired or not.
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .expect("session store mutex poisoned")
            .len()
    }

    /// Whether the store holds no sessions at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionValidator for MemorySessionStore {
    fn validate(&self, session_id: &str) -> Option<Session> {
        let mut sessions = self
            .sessions
            .lock()
            .expect("session store mutex poisoned");
        let session = sessions.get(session_id)?;
        if session.is_expired(Instant::now()) {
            sessions.remove(session_id);
            return None;
        }
        Some(session.clone())
    }
}

/// Extracts the session id from a request's `Cookie` header, if present.
///
/// Cookie pairs are split on `;`, whitespace-trimmed, and matched by name;
/// pairs without an `=` are skipped.
pub fn session_id(headers: &Headers) -> Option<String> {
    let cookie = headers.get("cookie")?;
    for pair in cookie.split(';') {
        if let Some((name, value)) = pair.split_once('=') {
            if name.trim() == SESSION_COOKIE {
                return Some(value.trim().to_owned());
            }
        }
    }
    None
}

/// `Set-Cookie` value that installs a session id.
pub fn set_cookie(session_id: &str) -> String {
    format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly")
}

/// `Set-Cookie` value that clears the session cookie.
pub fn clear_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; Max-Age=0; HttpOnly")
}
