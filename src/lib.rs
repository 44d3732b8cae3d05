//! # Soroban Profile Sync
//!
//! Keeps a user's on-chain profile record and its off-chain payload in step.
//!
//! The on-chain record is small: a schema version, the account role, the
//! last update time and the content hash of the full profile. The full
//! profile lives in a content-addressed store and is mirrored into a local
//! cache for reads. Features include:
//!
//! - Deterministic XDR codec for the on-chain `ScVal` map
//! - Cooldown between accepted writes, checked against the on-chain record
//! - Unsigned transaction payloads for external wallet signing
//! - Relay of signed envelopes without retries
//!
//! ## Usage
//!
//! ```rust,ignore
//! let service = ProfileSyncService::new(config, ledger, content, cache)?;
//!
//! // Prepare an update; the wallet signs `prepared.data_value_xdr` into a tx.
//! let prepared = service.update_profile("user-1", input).await?;
//!
//! // Relay the signed transaction.
//! let receipt = service.submit_on_chain_update(&signed_xdr).await?;
//! ```

mod events;
mod fields;
mod profile;
mod storage;
mod validation;

pub mod clock;
pub mod codec;
pub mod config;
pub mod content;
pub mod ledger;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{DecodeError, EncodeError, MAX_HASH_LENGTH};
pub use config::{ConfigError, SyncConfig};
pub use content::{ContentStore, IpfsContentStore, MemoryContentStore, StoreError};
pub use fields::{keys, FieldValue, ProfileField};
pub use ledger::{
    LedgerClient, LedgerError, MemoryLedger, OnChainProfiles, SignedEnvelope, UnsignedUpdate,
};
pub use profile::{AccountType, ProfileRecord, CURRENT_VERSION};
pub use service::{
    PreparedUpdate, ProfileSyncService, SubmitReceipt, UpdateProfileInput, UpdateStage,
};
pub use storage::{CacheError, CachedProfile, MemoryProfileCache, ProfileCache};
pub use validation::{
    validate_account_id, validate_display_name, validate_email, validate_symbol,
    ACCOUNT_ID_LENGTH, MAX_SYMBOL_LENGTH,
};

use thiserror::Error;

/// Error codes for profile synchronization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProfileError {
    /// Account type is not one of the known roles.
    #[error("invalid account type {0}")]
    InvalidAccountType(u32),

    /// Account id is not a Stellar public key.
    #[error("invalid Stellar account id {0:?}")]
    InvalidAccountId(String),

    /// Another input field failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The content store returned an address too long for the on-chain value.
    #[error("data hash too large: {len} bytes, limit is {max}")]
    HashTooLarge {
        /// Length of the returned hash.
        len: usize,
        /// Allowed length.
        max: usize,
    },

    /// The account wrote its profile too recently.
    #[error("profile update rate limited, retry in {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds until the cooldown ends.
        retry_after_secs: u64,
    },

    /// The content store failed.
    #[error("content store unavailable: {0}")]
    StoreUnavailable(String),

    /// The stored on-chain value cannot be decoded.
    #[error("on-chain profile is unreadable: {0}")]
    OnChainCorruption(#[source] DecodeError),

    /// The record could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The ledger could not be read.
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// The signed transaction is not a decodable, signed envelope.
    #[error("invalid transaction envelope: {0}")]
    InvalidEnvelope(String),

    /// The network refused the transaction.
    #[error("transaction rejected: {0}")]
    SubmissionRejected(String),

    /// The network could not be reached or timed out.
    #[error("transaction submission unavailable: {0}")]
    SubmissionUnavailable(String),

    /// The off-chain cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// No cached profile exists for the user.
    #[error("profile not found")]
    ProfileNotFound,

    /// Settings are invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ProfileError {
    /// Stable numeric code for the error, for transports that need one.
    pub fn code(&self) -> u32 {
        match self {
            ProfileError::InvalidAccountType(_) => 1,
            ProfileError::InvalidAccountId(_) => 2,
            ProfileError::InvalidInput(_) => 3,
            ProfileError::HashTooLarge { .. } => 4,
            ProfileError::RateLimited { .. } => 5,
            ProfileError::StoreUnavailable(_) => 6,
            ProfileError::OnChainCorruption(_) => 7,
            ProfileError::Encode(_) => 8,
            ProfileError::LedgerUnavailable(_) => 9,
            ProfileError::InvalidEnvelope(_) => 10,
            ProfileError::SubmissionRejected(_) => 11,
            ProfileError::SubmissionUnavailable(_) => 12,
            ProfileError::Cache(_) => 13,
            ProfileError::ProfileNotFound => 14,
            ProfileError::Config(_) => 15,
        }
    }

    /// Whether the error was raised by input validation, before any I/O.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ProfileError::InvalidAccountType(_)
                | ProfileError::InvalidAccountId(_)
                | ProfileError::InvalidInput(_)
                | ProfileError::HashTooLarge { .. }
                | ProfileError::InvalidEnvelope(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            ProfileError::InvalidAccountType(4),
            ProfileError::InvalidAccountId(String::new()),
            ProfileError::InvalidInput(String::new()),
            ProfileError::HashTooLarge { len: 129, max: 128 },
            ProfileError::RateLimited { retry_after_secs: 1 },
            ProfileError::StoreUnavailable(String::new()),
            ProfileError::OnChainCorruption(DecodeError::Truncated),
            ProfileError::Encode(EncodeError::EmptyVersion),
            ProfileError::LedgerUnavailable(String::new()),
            ProfileError::InvalidEnvelope(String::new()),
            ProfileError::SubmissionRejected(String::new()),
            ProfileError::SubmissionUnavailable(String::new()),
            ProfileError::Cache(CacheError::Unavailable(String::new())),
            ProfileError::ProfileNotFound,
            ProfileError::Config(ConfigError::Empty("x")),
        ];
        let mut codes: Vec<u32> = errors.iter().map(ProfileError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ProfileError::InvalidAccountType(4).to_string(),
            "invalid account type 4"
        );
        assert_eq!(
            ProfileError::RateLimited { retry_after_secs: 30 }.to_string(),
            "profile update rate limited, retry in 30 seconds"
        );
        assert_eq!(
            ProfileError::HashTooLarge { len: 256, max: 128 }.to_string(),
            "data hash too large: 256 bytes, limit is 128"
        );
    }
}
