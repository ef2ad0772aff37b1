use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;
use utoipa::ToSchema;
use uuid::Uuid;

/// Role name assigned to every account at registration.
pub const ROLE_USER: &str = "USER";
/// Role name granting access to the `/admin/**` tree.
pub const ROLE_ADMIN: &str = "ADMIN";
/// Prefix turning a role name into an authority string.
pub const AUTHORITY_PREFIX: &str = "ROLE_";

/// Builds the authority string (`ROLE_<name>`) consumed by the access policy.
pub fn authority(role_name: &str) -> String {
    format!("{AUTHORITY_PREFIX}{role_name}")
}

// --- Persisted Records ---

/// Role
///
/// A named permission grant stored in the `roles` table. Names are unique.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
}

impl Role {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
        }
    }
}

/// User
///
/// An account in the credential store. The password hash is written once at
/// registration; only the role set changes afterwards.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    // bcrypt hash, never the plaintext.
    pub password_hash: String,
    pub roles: BTreeSet<Role>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Fresh, unpersisted account holding a single initial role.
    pub fn new(username: &str, password_hash: String, initial_role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash,
            roles: BTreeSet::from([initial_role]),
            created_at: Utc::now(),
        }
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name == name)
    }

    /// Authorities derived from the role set, sorted.
    pub fn authorities(&self) -> Vec<String> {
        let mut authorities: Vec<String> = self.roles.iter().map(|r| authority(&r.name)).collect();
        authorities.sort();
        authorities.dedup();
        authorities
    }
}

/// Row shape of the `users` table; roles are loaded separately through `user_roles`.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    pub fn into_user(self, roles: Vec<Role>) -> User {
        User {
            id: self.id,
            username: self.username,
            password_hash: self.password_hash,
            roles: roles.into_iter().collect(),
            created_at: self.created_at,
        }
    }
}

// --- Authentication ---

/// Credentials
///
/// Everything a login attempt needs: the stored hash plus the authorities the
/// session will carry if the password matches.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub authorities: Vec<String>,
}

impl From<&User> for Credentials {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
            authorities: user.authorities(),
        }
    }
}

/// Principal
///
/// The authenticated identity attached to a session. Authorities are captured at
/// login time; role changes apply from the next login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
    pub authorities: Vec<String>,
}

impl Principal {
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }
}

impl From<Credentials> for Principal {
    fn from(credentials: Credentials) -> Self {
        Self {
            user_id: credentials.user_id,
            username: credentials.username,
            authorities: credentials.authorities,
        }
    }
}

// --- Form Payloads ---

/// Fields posted by the registration form (`application/x-www-form-urlencoded`).
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationForm {
    pub username: String,
    pub password: String,
}

/// Fields posted by the login form.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Query flags understood by `GET /login`.
#[derive(Debug, Default, Deserialize)]
pub struct LoginNotice {
    pub error: Option<String>,
    pub logout: Option<String>,
}

// --- Admin API Schemas ---

/// UserProfile
///
/// Output schema of the admin user endpoints. Never exposes the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    #[schema(example = "alice")]
    pub username: String,
    /// Role names, sorted.
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            roles: user
                .roles
                .into_iter()
                .map(|r| r.name)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            created_at: user.created_at,
        }
    }
}
