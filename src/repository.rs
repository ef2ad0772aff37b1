use crate::models::{Role, User, UserRow};
use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Failures surfaced by any credential store engine.
#[derive(Debug, Error)]
pub enum RepoError {
    /// A uniqueness constraint rejected the write (duplicate username).
    #[error("record already exists")]
    Conflict,

    #[error("record not found")]
    NotFound,

    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Conflict,
            sqlx::Error::RowNotFound => RepoError::NotFound,
            _ => RepoError::Backend(Box::new(err)),
        }
    }
}

/// Repository Trait
///
/// The credential store contract. Handlers and services only ever see
/// `Arc<dyn Repository>`, so the engine (Postgres, in-memory) is swappable.
///
/// Uniqueness of usernames and role names is the engine's job: `insert_user`
/// must fail with `RepoError::Conflict` for a taken username even under
/// concurrent registration, and `upsert_role` must resolve concurrent first
/// references to the same role.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Exact-match lookup, roles included. `Ok(None)` on a miss.
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;

    /// Persists a new user together with its role links.
    async fn insert_user(&self, user: User) -> Result<User, RepoError>;

    /// Replaces the stored role set of an existing user.
    async fn update_user(&self, user: User) -> Result<User, RepoError>;

    /// Returns the role with this name, creating it if absent.
    async fn upsert_role(&self, name: &str) -> Result<Role, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres Engine ---

/// PostgresRepository
///
/// `Repository` backed by the `users`, `roles` and `user_roles` tables created by
/// the embedded migrations.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the migrations under `./migrations`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn roles_of(&self, user_id: Uuid) -> Result<Vec<Role>, sqlx::Error> {
        sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.name
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn link_roles(
        tx: &mut Transaction<'_, Postgres>,
        user: &User,
    ) -> Result<(), sqlx::Error> {
        for role in &user.roles {
            sqlx::query(
                "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(user.id)
            .bind(role.id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("get_user_by_username error: {:?}", e))?;

        match row {
            Some(row) => {
                let roles = self.roles_of(row.id).await?;
                Ok(Some(row.into_user(roles)))
            }
            None => Ok(None),
        }
    }

    /// The `users.username` unique index turns a lost registration race into
    /// `RepoError::Conflict`; user row and role links commit together.
    async fn insert_user(&self, user: User) -> Result<User, RepoError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO users (id, username, password_hash, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await?;

        Self::link_roles(&mut tx, &user).await?;
        tx.commit().await?;

        Ok(user)
    }

    async fn update_user(&self, user: User) -> Result<User, RepoError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user.id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(RepoError::NotFound);
        }

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;
        Self::link_roles(&mut tx, &user).await?;
        tx.commit().await?;

        Ok(user)
    }

    /// Single-statement upsert; the no-op `DO UPDATE` makes `RETURNING` yield the
    /// existing row when the name is already taken.
    async fn upsert_role(&self, name: &str) -> Result<Role, RepoError> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (id, name) VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("upsert_role error: {:?}", e))?;
        Ok(role)
    }
}

// --- In-Memory Engine ---

/// InMemoryRepository
///
/// `Repository` over concurrent maps, used for local runs without a database and
/// in tests. The entry API gives the same atomic insert-if-absent guarantees as
/// the Postgres unique indexes.
#[derive(Default)]
pub struct InMemoryRepository {
    // Keyed by username.
    users: DashMap<String, User>,
    // Keyed by role name.
    roles: DashMap<String, Role>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Number of stored roles.
    pub fn role_count(&self) -> usize {
        self.roles.len()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        Ok(self.users.get(username).map(|entry| entry.value().clone()))
    }

    async fn insert_user(&self, user: User) -> Result<User, RepoError> {
        match self.users.entry(user.username.clone()) {
            Entry::Occupied(_) => Err(RepoError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(user.clone());
                Ok(user)
            }
        }
    }

    async fn update_user(&self, user: User) -> Result<User, RepoError> {
        match self.users.get_mut(&user.username) {
            Some(mut stored) if stored.id == user.id => {
                stored.roles = user.roles.clone();
                Ok(user)
            }
            _ => Err(RepoError::NotFound),
        }
    }

    async fn upsert_role(&self, name: &str) -> Result<Role, RepoError> {
        let role = self
            .roles
            .entry(name.to_string())
            .or_insert_with(|| Role::new(name))
            .value()
            .clone();
        Ok(role)
    }
}
