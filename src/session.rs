use crate::{config::AppConfig, models::Principal};
use axum::http::{HeaderMap, header};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Session
///
/// Server-side state behind one session cookie. Anonymous sessions exist only to
/// carry a flash message across a redirect.
#[derive(Debug, Clone)]
pub struct Session {
    pub principal: Option<Principal>,
    pub flash: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// SessionStore
///
/// Sessions keyed by an opaque random id (UUID v4). Expiry slides forward on
/// every successful lookup.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<Uuid, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn insert(&self, session: Session) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.insert(id, session);
        id
    }

    /// Issues a new authenticated session. The previous session, if any, is
    /// destroyed so a pre-login id can never be reused after login.
    pub fn login(&self, previous: Option<Uuid>, principal: Principal) -> Uuid {
        if let Some(previous) = previous {
            self.sessions.remove(&previous);
        }
        self.insert(Session {
            principal: Some(principal),
            flash: None,
            expires_at: Utc::now() + self.ttl,
        })
    }

    /// Principal of a live session; expired sessions are dropped on sight.
    pub fn principal(&self, id: Uuid) -> Option<Principal> {
        let now = Utc::now();
        if self
            .sessions
            .remove_if(&id, |_, session| session.expires_at <= now)
            .is_some()
        {
            return None;
        }
        let mut session = self.sessions.get_mut(&id)?;
        session.expires_at = now + self.ttl;
        session.principal.clone()
    }

    /// Attaches a flash message to the given session, or to a new anonymous one
    /// when the client has none. Returns the id the client should hold.
    pub fn set_flash(&self, id: Option<Uuid>, message: impl Into<String>) -> Uuid {
        let message = message.into();
        let now = Utc::now();
        if let Some(id) = id {
            if let Some(mut session) = self.sessions.get_mut(&id) {
                if session.expires_at > now {
                    session.flash = Some(message);
                    session.expires_at = now + self.ttl;
                    return id;
                }
            }
        }
        self.insert(Session {
            principal: None,
            flash: Some(message),
            expires_at: now + self.ttl,
        })
    }

    /// Removes and returns the pending flash message.
    pub fn take_flash(&self, id: Uuid) -> Option<String> {
        let now = Utc::now();
        let mut session = self.sessions.get_mut(&id)?;
        if session.expires_at <= now {
            return None;
        }
        session.flash.take()
    }

    /// Destroys the session. Unknown ids are ignored.
    pub fn destroy(&self, id: Uuid) {
        self.sessions.remove(&id);
    }

    /// Drops every expired session and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.expires_at > now);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// --- Cookie Plumbing ---

/// Extracts the session id from the `Cookie` headers. Malformed values are
/// treated as absent.
pub fn session_id_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

/// `Set-Cookie` value handing the session id to the client.
pub fn session_cookie(config: &AppConfig, id: Uuid, ttl: Duration) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        config.session_cookie_name,
        id,
        ttl.num_seconds(),
        if config.secure_cookies { "; Secure" } else { "" }
    )
}

/// `Set-Cookie` value that makes the client forget the session id.
pub fn clear_session_cookie(config: &AppConfig) -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{}",
        config.session_cookie_name,
        if config.secure_cookies { "; Secure" } else { "" }
    )
}
