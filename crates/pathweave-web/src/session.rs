//! Cookie-backed sessions and request identity

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;
use pathweave_core::{SESSION_COOKIE, USER_COOKIE};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::AppState;

#[derive(Debug, Clone, Default)]
struct SessionData {
    user: Option<String>,
}

/// In-memory session store.
///
/// Clients hold `<id>.<signature>` in the session cookie; the signature is
/// a SHA-256 digest of the secret key and the id.
pub struct SessionStore {
    secret: String,
    sessions: Mutex<HashMap<String, SessionData>>,
}

impl SessionStore {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn signature(&self, id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b":");
        hasher.update(id.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Cookie value for a session id
    pub fn sign(&self, id: &str) -> String {
        format!("{}.{}", id, self.signature(id))
    }

    /// Session id carried by a cookie value, if the signature holds
    pub fn verify(&self, value: &str) -> Option<String> {
        let (id, signature) = value.rsplit_once('.')?;
        if id.is_empty() || !constant_time_eq(signature.as_bytes(), self.signature(id).as_bytes()) {
            return None;
        }
        Some(id.to_string())
    }

    /// User stored in a session
    pub fn user(&self, id: &str) -> Option<String> {
        self.sessions.lock().get(id).and_then(|s| s.user.clone())
    }

    /// Store a user, reusing the session when there is one; returns the session id
    pub fn login(&self, existing: Option<&str>, user: &str) -> String {
        let id = existing
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        self.sessions.lock().entry(id.clone()).or_default().user = Some(user.to_string());
        id
    }

    /// Drop the user from a session
    pub fn logout(&self, id: &str) {
        if let Some(session) = self.sessions.lock().get_mut(id) {
            session.user = None;
        }
    }

    /// `Set-Cookie` value carrying a session id
    pub fn cookie(&self, id: &str) -> HeaderValue {
        let value = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE,
            self.sign(id)
        );
        HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(""))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Parse every `Cookie` header into name/value pairs
pub fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.trim().to_string(), value.trim().trim_matches('"').to_string()))
        })
        .collect()
}

/// Who is making the request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Verified session id from the session cookie
    pub session_id: Option<String>,
    /// User stored in the session
    pub session_user: Option<String>,
    /// User carried directly by the `user` cookie
    pub cookie_user: Option<String>,
}

impl Identity {
    /// Resolve the identity of a request from its cookies
    pub fn from_headers(headers: &HeaderMap, sessions: &SessionStore) -> Self {
        let cookies = parse_cookies(headers);
        let session_id = cookies
            .get(SESSION_COOKIE)
            .and_then(|value| sessions.verify(value));
        let session_user = session_id
            .as_deref()
            .and_then(|id| sessions.user(id))
            .filter(|u| !u.is_empty());
        let cookie_user = cookies
            .get(USER_COOKIE)
            .cloned()
            .filter(|u| !u.is_empty());

        Self {
            session_id,
            session_user,
            cookie_user,
        }
    }

    /// Session user, falling back to the cookie user
    pub fn user(&self) -> Option<&str> {
        self.session_user.as_deref().or(self.cookie_user.as_deref())
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }
}

/// Middleware attaching an [`Identity`] to every request
pub async fn identify(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let identity = Identity::from_headers(request.headers(), &state.sessions);
    request.extensions_mut().insert(identity);
    next.run(request).await
}
