use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("bcrypt failure: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// PasswordHasher
///
/// bcrypt with a fixed work factor. Hashing and verification are CPU-bound and
/// run on the blocking pool so they never stall the async workers.
///
/// A dummy hash of the same cost is prepared at construction. Login attempts for
/// unknown usernames verify against it, so both failure paths cost one bcrypt
/// verification.
#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    dummy_hash: Arc<str>,
}

impl PasswordHasher {
    /// Fails if `cost` is outside bcrypt's accepted range.
    pub fn new(cost: u32) -> Result<Self, HashError> {
        let dummy_hash = bcrypt::hash("dummy-password-for-timing", cost)?;
        Ok(Self {
            cost,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    /// Salted one-way hash in modular crypt format (`$2b$...`).
    pub async fn hash(&self, password: &str) -> Result<String, HashError> {
        let password = password.to_owned();
        let cost = self.cost;
        let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
        Ok(hashed)
    }

    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, HashError> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        let matched = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
        Ok(matched)
    }

    /// Burns one verification against the dummy hash. The outcome is discarded.
    pub async fn verify_dummy(&self, password: &str) {
        let dummy = self.dummy_hash.to_string();
        if let Err(e) = self.verify(password, &dummy).await {
            tracing::warn!("dummy verification failed: {}", e);
        }
    }
}
