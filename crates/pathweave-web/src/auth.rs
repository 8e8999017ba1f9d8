//! Login gate for protected paths
//!
//! A path is protected when it starts with one of the configured prefixes
//! or when one of the configured regular expressions matches at its start.
//! Patterns are anchored at the beginning only: `^/user/[^/]+` protects
//! `/user/1/anything` as well.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use pathweave_core::{Result, Settings, LOGIN_PATH};
use regex::Regex;
use tracing::debug;

use crate::session::Identity;
use crate::AppState;

#[derive(Debug, Clone, Default)]
pub struct AuthGate {
    prefixes: Vec<String>,
    patterns: Vec<Regex>,
}

impl AuthGate {
    /// Compile the rules; an invalid pattern is an error
    pub fn new(prefixes: Vec<String>, patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(&format!(r"\A(?:{})", p)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { prefixes, patterns })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.protected_routes.clone(), &settings.protected_patterns)
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
            || self.patterns.iter().any(|pattern| pattern.is_match(path))
    }

    /// Whether a request for `path` by `identity` may proceed
    pub fn allows(&self, path: &str, identity: &Identity) -> bool {
        !self.is_protected(path) || identity.is_authenticated()
    }
}

/// Redirect to the login page
pub fn login_redirect() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, LOGIN_PATH)]).into_response()
}

/// Middleware run in front of discovered routes
pub async fn require_login(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let identity = request
        .extensions()
        .get::<Identity>()
        .cloned()
        .unwrap_or_else(|| Identity::from_headers(request.headers(), &state.sessions));

    let path = request.uri().path();
    if !state.auth.allows(path, &identity) {
        debug!("Redirecting anonymous request for {} to {}", path, LOGIN_PATH);
        return login_redirect();
    }
    next.run(request).await
}
