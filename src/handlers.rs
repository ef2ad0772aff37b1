use crate::{
    AppState,
    auth::{AuthError, AuthUser, resolve_principal},
    error::AppError,
    models::{self, LoginForm, LoginNotice, Principal, ROLE_ADMIN, RegistrationForm, UserProfile},
    service::ServiceError,
    session::{clear_session_cookie, session_cookie, session_id_from_headers},
    views,
};
use axum::{
    Form, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};

pub const REGISTRATION_SUCCESS: &str = "Registration successful! Please log in.";

// --- Pages ---

/// home
///
/// [Public Route] Landing page for `/` and `/home`.
pub async fn home(State(state): State<AppState>, headers: HeaderMap) -> Html<String> {
    let principal = resolve_principal(&headers, &state.sessions, &state.config);
    Html(views::home(principal.as_ref().map(|p| p.username.as_str())))
}

/// hello
///
/// [Authenticated Route] Post-login landing page.
pub async fn hello(AuthUser(principal): AuthUser) -> Html<String> {
    Html(views::hello(&principal.username, &principal.authorities))
}

// --- Registration ---

/// registration_form
///
/// [Public Route] Renders an empty registration form.
pub async fn registration_form() -> Html<String> {
    Html(views::registration(None, ""))
}

/// register_user
///
/// [Public Route] Handles the registration form post.
///
/// *Flow*: on success a one-shot flash message is stored in the client's session
/// (an anonymous one is issued if needed) and the client is sent to the login
/// page. A taken username re-renders the form with the error attached.
pub async fn register_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, AppError> {
    match state.users.register(&form.username, &form.password).await {
        Ok(_) => {
            let current = session_id_from_headers(&headers, &state.config.session_cookie_name);
            let session_id = state.sessions.set_flash(current, REGISTRATION_SUCCESS);
            let cookie = session_cookie(&state.config, session_id, state.sessions.ttl());
            Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/login")).into_response())
        }
        Err(ServiceError::DuplicateUser) => Ok(Html(views::registration(
            Some(&ServiceError::DuplicateUser.to_string()),
            &form.username,
        ))
        .into_response()),
        Err(e) => Err(e.into()),
    }
}

// --- Login / Logout ---

/// login_form
///
/// [Public Route] Renders the login form, consuming any pending flash message.
/// `?error` and `?logout` select the failure and logout notices.
pub async fn login_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(notice): Query<LoginNotice>,
) -> Html<String> {
    let flash = session_id_from_headers(&headers, &state.config.session_cookie_name)
        .and_then(|id| state.sessions.take_flash(id));
    Html(views::login(
        flash.as_deref(),
        notice.error.is_some(),
        notice.logout.is_some(),
    ))
}

/// login
///
/// [Public Route] Form login. Success rotates the session id and lands on
/// `/hello`; any credential failure lands on `/login?error` with no hint as to
/// which part was wrong.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    match state.auth.authenticate(&form.username, &form.password).await {
        Ok(credentials) => {
            let previous = session_id_from_headers(&headers, &state.config.session_cookie_name);
            let session_id = state
                .sessions
                .login(previous, Principal::from(credentials));
            let cookie = session_cookie(&state.config, session_id, state.sessions.ttl());
            Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/hello")).into_response())
        }
        Err(AuthError::BadCredentials | AuthError::UserNotFound) => {
            Ok(Redirect::to("/login?error").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// logout
///
/// [Public Route] Destroys the session (if any) and clears the cookie.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(id) = session_id_from_headers(&headers, &state.config.session_cookie_name) {
        state.sessions.destroy(id);
    }
    let cookie = clear_session_cookie(&state.config);
    ([(header::SET_COOKIE, cookie)], Redirect::to("/login?logout")).into_response()
}

// --- Admin API ---

/// get_user_profile
///
/// [Admin Route] Returns the stored profile of an account.
///
/// *Authorization*: the policy layer already requires `ROLE_ADMIN` for the whole
/// `/admin` tree; the handler re-checks it.
#[utoipa::path(
    get,
    path = "/admin/users/{username}",
    params(("username" = String, Path, description = "Exact username")),
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 403, description = "Caller lacks ROLE_ADMIN"),
        (status = 404, description = "No such user")
    )
)]
pub async fn get_user_profile(
    user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<UserProfile>, StatusCode> {
    if !user.has_authority(&models::authority(ROLE_ADMIN)) {
        return Err(StatusCode::FORBIDDEN);
    }
    match state.users.find_by_username(&username).await {
        Ok(Some(found)) => Ok(Json(UserProfile::from(found))),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("get_user_profile error: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// grant_admin_role
///
/// [Admin Route] Assigns the `ADMIN` role to an account. Idempotent. The new
/// authority applies from that user's next login.
#[utoipa::path(
    post,
    path = "/admin/users/{username}/roles/admin",
    params(("username" = String, Path, description = "Exact username")),
    responses(
        (status = 200, description = "Updated profile", body = UserProfile),
        (status = 403, description = "Caller lacks ROLE_ADMIN"),
        (status = 404, description = "No such user")
    )
)]
pub async fn grant_admin_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<UserProfile>, StatusCode> {
    if !user.has_authority(&models::authority(ROLE_ADMIN)) {
        return Err(StatusCode::FORBIDDEN);
    }
    match state.users.promote_by_username(&username).await {
        Ok(Some(promoted)) => {
            tracing::info!(admin = %user.0.username, target = %username, "admin role granted");
            Ok(Json(UserProfile::from(promoted)))
        }
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("grant_admin_role error: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// openapi_document
///
/// [Admin Route] Serves the OpenAPI description of the admin API.
pub async fn openapi_document() -> impl IntoResponse {
    use utoipa::OpenApi;
    Json(crate::ApiDoc::openapi())
}
