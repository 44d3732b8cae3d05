//! Off-chain profile cache.
//!
//! The cache mirrors the latest profile each user prepared, for cheap reads.
//! It is never consulted for rate limiting; the on-chain record is.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::profile::AccountType;

/// Errors from the cache backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The backend could not be reached.
    #[error("profile cache unavailable: {0}")]
    Unavailable(String),

    /// The account is already cached under another user.
    #[error("account {account_id} is already linked to another user")]
    AccountConflict {
        /// The contested account.
        account_id: String,
    },
}

/// Denormalized profile row, one per user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedProfile {
    /// Application user id.
    pub user_id: String,

    /// Stellar account holding the on-chain record.
    pub account_id: String,

    /// Account role.
    pub account_type: AccountType,

    /// Content address of the full payload.
    pub data_hash: String,

    /// Display name.
    pub display_name: String,

    /// Contact email.
    pub email: Option<String>,

    /// Avatar URL.
    pub avatar_url: Option<String>,

    /// The full payload as uploaded.
    pub profile_json: serde_json::Value,

    /// First time the row was written, seconds since epoch.
    pub created_at: u64,

    /// Last time the row was written, seconds since epoch.
    pub synced_at: u64,
}

/// Upsert-by-user profile store.
#[async_trait]
pub trait ProfileCache: Send + Sync {
    /// Fetch the row for `user_id`.
    async fn find_by_user(&self, user_id: &str) -> Result<Option<CachedProfile>, CacheError>;

    /// Insert or overwrite the row for `profile.user_id`.
    async fn upsert(&self, profile: CachedProfile) -> Result<CachedProfile, CacheError>;
}

/// In-process cache keyed by user id.
#[derive(Debug, Default)]
pub struct MemoryProfileCache {
    rows: RwLock<HashMap<String, CachedProfile>>,
    writes: AtomicUsize,
}

impl MemoryProfileCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of upserts applied so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of cached rows.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Whether the cache holds no rows.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl ProfileCache for MemoryProfileCache {
    async fn find_by_user(&self, user_id: &str) -> Result<Option<CachedProfile>, CacheError> {
        Ok(self.rows.read().await.get(user_id).cloned())
    }

    async fn upsert(&self, profile: CachedProfile) -> Result<CachedProfile, CacheError> {
        let mut rows = self.rows.write().await;

        // Account ids are unique across users.
        let taken = rows
            .values()
            .any(|row| row.account_id == profile.account_id && row.user_id != profile.user_id);
        if taken {
            return Err(CacheError::AccountConflict {
                account_id: profile.account_id,
            });
        }

        rows.insert(profile.user_id.clone(), profile.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(profile)
    }
}
