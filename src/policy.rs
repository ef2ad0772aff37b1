//! Path-based authorization evaluated before any handler runs.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};

use crate::{
    AppState,
    models::{Principal, ROLE_ADMIN, authority},
    session::{session_cookie, session_id_from_headers},
    views,
};

/// Path matcher: an exact path, or `prefix/**` covering the prefix and
/// everything below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Exact(String),
    Subtree(String),
    Any,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        match pattern {
            "/**" => PathPattern::Any,
            _ => match pattern.strip_suffix("/**") {
                Some(prefix) => PathPattern::Subtree(prefix.to_string()),
                None => PathPattern::Exact(pattern.to_string()),
            },
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(exact) => path == exact,
            PathPattern::Subtree(prefix) => path
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
            PathPattern::Any => true,
        }
    }
}

/// Requirement attached to a matched path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Authority(String),
}

/// Outcome of evaluating the policy for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    RedirectToLogin,
    Forbidden,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub pattern: PathPattern,
    pub access: Access,
}

/// AccessPolicy
///
/// Ordered rules; the first matching rule decides. A path no rule matches
/// requires authentication.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    rules: Vec<Rule>,
}

impl AccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, pattern: &str, access: Access) -> Self {
        self.rules.push(Rule {
            pattern: PathPattern::parse(pattern),
            access,
        });
        self
    }

    pub fn permit_all(self, patterns: &[&str]) -> Self {
        patterns
            .iter()
            .fold(self, |policy, pattern| policy.rule(pattern, Access::Public))
    }

    /// The application's route table: public pages, the admin tree, then
    /// everything else behind login.
    pub fn standard() -> Self {
        AccessPolicy::new()
            .permit_all(&["/", "/home"])
            .permit_all(&["/registration", "/login", "/logout", "/health"])
            .rule("/admin/**", Access::Authority(authority(ROLE_ADMIN)))
            .rule("/**", Access::Authenticated)
    }

    pub fn evaluate(&self, path: &str, principal: Option<&Principal>) -> Decision {
        let access = self
            .rules
            .iter()
            .find(|rule| rule.pattern.matches(path))
            .map(|rule| &rule.access)
            .unwrap_or(&Access::Authenticated);

        match (access, principal) {
            (Access::Public, _) => Decision::Allow,
            (_, None) => Decision::RedirectToLogin,
            (Access::Authenticated, Some(_)) => Decision::Allow,
            (Access::Authority(required), Some(principal)) => {
                if principal.has_authority(required) {
                    Decision::Allow
                } else {
                    Decision::Forbidden
                }
            }
        }
    }
}

/// enforce_access
///
/// Middleware applied to the whole router, fallback included, so paths without
/// a handler are still denied or permitted by the policy.
///
/// A permitted request on a live session gets its cookie re-issued with a fresh
/// `Max-Age`, keeping the client in step with the sliding server-side expiry.
/// Handlers that set their own session cookie (login, logout, registration)
/// keep theirs.
pub async fn enforce_access(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let session_id = session_id_from_headers(request.headers(), &state.config.session_cookie_name);
    let principal = session_id.and_then(|id| state.sessions.principal(id));
    let path = request.uri().path().to_owned();

    match state.policy.evaluate(&path, principal.as_ref()) {
        Decision::Allow => {
            let mut response = next.run(request).await;
            if let (Some(id), Some(_)) = (session_id, principal.as_ref()) {
                if !response.headers().contains_key(header::SET_COOKIE) {
                    let cookie = session_cookie(&state.config, id, state.sessions.ttl());
                    if let Ok(value) = HeaderValue::from_str(&cookie) {
                        response.headers_mut().insert(header::SET_COOKIE, value);
                    }
                }
            }
            response
        }
        Decision::RedirectToLogin => {
            tracing::debug!(%path, "unauthenticated request redirected to login");
            Redirect::to("/login").into_response()
        }
        Decision::Forbidden => {
            tracing::warn!(
                %path,
                username = principal.as_ref().map(|p| p.username.as_str()),
                "access denied"
            );
            (StatusCode::FORBIDDEN, Html(views::forbidden())).into_response()
        }
    }
}
