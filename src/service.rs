//! Account lifecycle: registration, admin-role assignment and lookup.

use crate::{
    models::{ROLE_ADMIN, ROLE_USER, User},
    password::{HashError, PasswordHasher},
    repository::{RepoError, RepositoryState},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("User already exists")]
    DuplicateUser,

    #[error(transparent)]
    Repository(#[from] RepoError),

    #[error(transparent)]
    Hashing(#[from] HashError),
}

/// UserService
///
/// Owns the registration rules. Collaborators are passed in at construction;
/// cloning is cheap (two `Arc`s).
#[derive(Clone)]
pub struct UserService {
    repo: RepositoryState,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(repo: RepositoryState, hasher: PasswordHasher) -> Self {
        Self { repo, hasher }
    }

    /// register
    ///
    /// Creates an account holding the `USER` role. Usernames are compared as exact
    /// strings. The lookup up front only saves a bcrypt round for the common
    /// duplicate case; the storage conflict on insert is what guarantees
    /// uniqueness when two registrations race.
    pub async fn register(&self, username: &str, password: &str) -> Result<User, ServiceError> {
        if self.repo.get_user_by_username(username).await?.is_some() {
            tracing::info!(username, "registration rejected: username taken");
            return Err(ServiceError::DuplicateUser);
        }

        let password_hash = self.hasher.hash(password).await?;
        let user_role = self.repo.upsert_role(ROLE_USER).await?;
        let user = User::new(username, password_hash, user_role);

        match self.repo.insert_user(user).await {
            Ok(user) => {
                tracing::info!(username, user_id = %user.id, "user registered");
                Ok(user)
            }
            Err(RepoError::Conflict) => {
                tracing::info!(username, "registration lost a race for the username");
                Err(ServiceError::DuplicateUser)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// assign_admin_role
    ///
    /// Adds `ADMIN` to the user's role set and persists it. Applying it again is
    /// a no-op on the set.
    pub async fn assign_admin_role(&self, mut user: User) -> Result<User, ServiceError> {
        let admin_role = self.repo.upsert_role(ROLE_ADMIN).await?;
        user.roles.insert(admin_role);
        let user = self.repo.update_user(user).await?;
        tracing::info!(username = %user.username, "ADMIN role assigned");
        Ok(user)
    }

    /// Plain lookup; a miss is `Ok(None)`, not an error.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.repo.get_user_by_username(username).await?)
    }

    /// Looks the user up and assigns `ADMIN`. `Ok(None)` if no such user.
    pub async fn promote_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        match self.find_by_username(username).await? {
            Some(user) => Ok(Some(self.assign_admin_role(user).await?)),
            None => Ok(None),
        }
    }
}
