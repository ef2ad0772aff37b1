use auth_portal::{
    AppConfig, AppState, InMemoryRepository, create_router, handlers::REGISTRATION_SUCCESS,
    models::UserProfile,
};
use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use std::sync::Arc;
use tower::util::ServiceExt;

// --- Test Harness ---

struct TestApp {
    router: Router,
    state: AppState,
    repo: Arc<InMemoryRepository>,
}

fn spawn_app() -> TestApp {
    let repo = Arc::new(InMemoryRepository::new());
    let state = AppState::new(AppConfig::default(), repo.clone()).unwrap();
    TestApp {
        router: create_router(state.clone()),
        state,
        repo,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, uri: &str, form: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(form.to_string())).unwrap())
            .await
    }

    async fn register(&self, username: &str, password: &str) -> Response<Body> {
        self.post_form(
            "/registration",
            &format!("username={username}&password={password}"),
            None,
        )
        .await
    }

    /// Logs in through the form and returns the `name=value` session cookie.
    async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .post_form(
                "/login",
                &format!("username={username}&password={password}"),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/hello");
        session_pair(&response).expect("login should set the session cookie")
    }

    async fn login_as_admin(&self, username: &str) -> String {
        self.register(username, "adminpw").await;
        self.state
            .users
            .promote_by_username(username)
            .await
            .unwrap()
            .unwrap();
        self.login(username, "adminpw").await
    }
}

fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// `name=value` part of the `Set-Cookie` header, if any.
fn session_pair(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// --- Public Pages ---

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app();

    let response = app.get("/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn test_home_pages_are_public() {
    let app = spawn_app();

    for path in ["/", "/home"] {
        let response = app.get(path, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Welcome"));
    }
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = spawn_app();

    let response = app.get("/", None).await;

    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_hello_requires_login() {
    let app = spawn_app();

    let response = app.get("/hello", None).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

// --- Registration ---

#[tokio::test]
async fn test_registration_form_renders_empty() {
    let app = spawn_app();

    let response = app.get("/registration", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains(r#"action="/registration""#));
    assert!(body.contains(r#"value="""#));
}

#[tokio::test]
async fn test_registration_redirects_with_flash() {
    let app = spawn_app();

    let response = app.register("alice", "pw1").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    let cookie = session_pair(&response).expect("flash needs a session cookie");

    let first = body_text(app.get("/login", Some(&cookie)).await).await;
    assert!(first.contains(REGISTRATION_SUCCESS));

    let second = body_text(app.get("/login", Some(&cookie)).await).await;
    assert!(!second.contains(REGISTRATION_SUCCESS));
}

#[tokio::test]
async fn test_duplicate_registration_rerenders_form() {
    let app = spawn_app();
    app.register("alice", "pw1").await;

    let response = app.register("alice", "pw2").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("User already exists"));
    assert!(body.contains(r#"value="alice""#));
    assert_eq!(app.repo.user_count(), 1);

    // The original password still works.
    app.login("alice", "pw1").await;
}

// --- Login / Logout ---

#[tokio::test]
async fn test_login_then_hello() {
    let app = spawn_app();
    app.register("alice", "pw1").await;

    let cookie = app.login("alice", "pw1").await;
    let response = app.get("/hello", Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("Hello alice!"));
    assert!(body.contains("ROLE_USER"));
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = spawn_app();
    app.register("alice", "pw1").await;

    let wrong_password = app
        .post_form("/login", "username=alice&password=nope", None)
        .await;
    let unknown_user = app
        .post_form("/login", "username=mallory&password=nope", None)
        .await;

    for response in [&wrong_password, &unknown_user] {
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(response), "/login?error");
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    let page = body_text(app.get("/login?error", None).await).await;
    assert!(page.contains("Invalid username or password."));
}

#[tokio::test]
async fn test_logout_invalidates_session() {
    let app = spawn_app();
    app.register("alice", "pw1").await;
    let cookie = app.login("alice", "pw1").await;

    let response = app.post_form("/logout", "", Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?logout");
    let cleared = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(cleared.contains("Max-Age=0"));

    let after = app.get("/hello", Some(&cookie)).await;
    assert_eq!(after.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&after), "/login");

    let page = body_text(app.get("/login?logout", None).await).await;
    assert!(page.contains("You have been logged out."));
}

#[tokio::test]
async fn test_logout_without_session_is_public() {
    let app = spawn_app();

    let response = app.post_form("/logout", "", None).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?logout");
}

#[tokio::test]
async fn test_login_rotates_pre_login_session() {
    let app = spawn_app();
    let registered = app.register("alice", "pw1").await;
    let anonymous = session_pair(&registered).unwrap();

    let response = app
        .post_form("/login", "username=alice&password=pw1", Some(&anonymous))
        .await;
    let authenticated = session_pair(&response).unwrap();

    assert_ne!(anonymous, authenticated);
    let stale = app.get("/hello", Some(&anonymous)).await;
    assert_eq!(stale.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_authenticated_request_refreshes_session_cookie() {
    let app = spawn_app();
    app.register("alice", "pw1").await;
    let cookie = app.login("alice", "pw1").await;

    let response = app.get("/hello", Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let refreshed = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("live session should get its cookie re-issued");
    assert!(refreshed.starts_with(&format!("{cookie};")));
    assert!(refreshed.contains("Max-Age=1800"));
}

#[tokio::test]
async fn test_anonymous_request_gets_no_session_cookie() {
    let app = spawn_app();

    let response = app.get("/", None).await;

    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_logout_cookie_is_not_overwritten_by_refresh() {
    let app = spawn_app();
    app.register("alice", "pw1").await;
    let cookie = app.login("alice", "pw1").await;

    let response = app.post_form("/logout", "", Some(&cookie)).await;

    let cookies: Vec<_> = response.headers().get_all(header::SET_COOKIE).iter().collect();
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].to_str().unwrap().contains("Max-Age=0"));
}

// --- Admin Tree ---

#[tokio::test]
async fn test_admin_path_anonymous_redirected() {
    let app = spawn_app();

    let response = app.get("/admin/x", None).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_admin_path_forbidden_for_user() {
    let app = spawn_app();
    app.register("alice", "pw1").await;
    let cookie = app.login("alice", "pw1").await;

    let response = app.get("/admin/x", Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_path_permitted_for_admin() {
    let app = spawn_app();
    let cookie = app.login_as_admin("root").await;

    // No handler lives at /admin/x: permitted by the policy, then 404.
    let response = app.get("/admin/x", Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_can_view_and_promote_users() {
    let app = spawn_app();
    app.register("alice", "pw1").await;
    let cookie = app.login_as_admin("root").await;

    let response = app.get("/admin/users/alice", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let profile: UserProfile = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(profile.username, "alice");
    assert_eq!(profile.roles, vec!["USER".to_string()]);

    for _ in 0..2 {
        let response = app
            .post_form("/admin/users/alice/roles/admin", "", Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let profile: UserProfile = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(profile.roles, vec!["ADMIN".to_string(), "USER".to_string()]);
    }

    // The new authority applies from alice's next login.
    let alice = app.login("alice", "pw1").await;
    let response = app.get("/admin/x", Some(&alice)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_api_unknown_user() {
    let app = spawn_app();
    let cookie = app.login_as_admin("root").await;

    let response = app.get("/admin/users/ghost", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .post_form("/admin/users/ghost/roles/admin", "", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_api_forbidden_for_user() {
    let app = spawn_app();
    app.register("alice", "pw1").await;
    let cookie = app.login("alice", "pw1").await;

    let response = app
        .post_form("/admin/users/alice/roles/admin", "", Some(&cookie))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let stored = app.state.users.find_by_username("alice").await.unwrap().unwrap();
    assert_eq!(stored.roles.len(), 1);
}

#[tokio::test]
async fn test_openapi_document_for_admin() {
    let app = spawn_app();
    let cookie = app.login_as_admin("root").await;

    let response = app
        .get("/admin/api-docs/openapi.json", Some(&cookie))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let doc: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert!(doc["paths"]["/admin/users/{username}"].is_object());
}
