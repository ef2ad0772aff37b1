//! Server-rendered HTML pages. Every interpolated value goes through `escape`.

/// Escapes text for safe interpolation into HTML element content and
/// double-quoted attribute values.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{title}</title>
</head>
<body>
{body}
</body>
</html>
"#,
        title = escape(title),
        body = body,
    )
}

fn notice(class: &str, message: &str) -> String {
    format!(r#"<p class="{class}">{}</p>"#, escape(message))
}

const LOGOUT_FORM: &str = r#"<form action="/logout" method="post"><button type="submit">Sign out</button></form>"#;

/// Landing page for `/` and `/home`.
pub fn home(username: Option<&str>) -> String {
    let links = match username {
        Some(name) => format!(
            r#"<p>Signed in as {}. Go to <a href="/hello">your page</a>.</p>
{LOGOUT_FORM}"#,
            escape(name)
        ),
        None => r#"<p><a href="/login">Sign in</a> or <a href="/registration">create an account</a>.</p>"#
            .to_string(),
    };
    layout("Welcome", &format!("<h1>Welcome!</h1>\n{links}"))
}

/// Login form with the optional one-shot notices.
pub fn login(flash: Option<&str>, failed: bool, logged_out: bool) -> String {
    let mut notices = String::new();
    if let Some(message) = flash {
        notices.push_str(&notice("flash", message));
    }
    if failed {
        notices.push_str(&notice("error", "Invalid username or password."));
    }
    if logged_out {
        notices.push_str(&notice("info", "You have been logged out."));
    }
    let body = format!(
        r#"<h1>Sign in</h1>
{notices}
<form action="/login" method="post">
  <label>Username <input type="text" name="username" autofocus></label>
  <label>Password <input type="password" name="password"></label>
  <button type="submit">Sign in</button>
</form>
<p>No account? <a href="/registration">Register</a>.</p>"#
    );
    layout("Sign in", &body)
}

/// Registration form; `error` is shown above it when a submission was rejected.
pub fn registration(error: Option<&str>, username: &str) -> String {
    let error = error.map(|e| notice("error", e)).unwrap_or_default();
    let body = format!(
        r#"<h1>Register</h1>
{error}
<form action="/registration" method="post">
  <label>Username <input type="text" name="username" value="{username}"></label>
  <label>Password <input type="password" name="password"></label>
  <button type="submit">Register</button>
</form>
<p>Already registered? <a href="/login">Sign in</a>.</p>"#,
        username = escape(username),
    );
    layout("Register", &body)
}

/// Post-login landing page.
pub fn hello(username: &str, authorities: &[String]) -> String {
    let items: String = authorities
        .iter()
        .map(|a| format!("<li>{}</li>", escape(a)))
        .collect();
    let body = format!(
        r#"<h1>Hello {}!</h1>
<p>Your authorities:</p>
<ul>{items}</ul>
{LOGOUT_FORM}"#,
        escape(username)
    );
    layout("Hello", &body)
}

pub fn forbidden() -> String {
    layout(
        "Forbidden",
        r#"<h1>403 Forbidden</h1><p>You do not have access to this page.</p><p><a href="/">Home</a></p>"#,
    )
}

pub fn server_error() -> String {
    layout(
        "Error",
        r#"<h1>Something went wrong</h1><p>Please try again later.</p>"#,
    )
}
