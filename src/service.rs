//! Profile synchronization.
//!
//! An update attempt walks these stages:
//!
//! ```text
//! Start -> RateLimitChecked -> PayloadStored -> RecordEncoded -> TransactionBuilt
//!       -> (wallet signs) -> Submitted
//! ```
//!
//! The cooldown check reads the on-chain record and decides locally. It is
//! advisory: two concurrent attempts for one account can both pass it, and
//! the ledger decides which signed write applies. Nothing here locks.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::codec::{self, MAX_HASH_LENGTH};
use crate::config::SyncConfig;
use crate::content::ContentStore;
use crate::events::{
    emit_rate_limited, emit_stage, emit_update_prepared, emit_update_submitted,
};
use crate::ledger::{LedgerClient, OnChainProfiles, SignedEnvelope};
use crate::profile::{AccountType, ProfileRecord};
use crate::storage::{CachedProfile, ProfileCache};
use crate::validation::{
    validate_account_id, validate_display_name, validate_email, validate_url,
};
use crate::ProfileError;

/// Stages of a single update attempt.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UpdateStage {
    /// Input validated, nothing read yet.
    Start,
    /// Cooldown checked against the on-chain record.
    RateLimitChecked,
    /// Full payload uploaded to the content store.
    PayloadStored,
    /// On-chain record encoded.
    RecordEncoded,
    /// Unsigned write built and returned for signing.
    TransactionBuilt,
    /// Signed write accepted by the ledger.
    Submitted,
}

/// A user's requested profile change.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileInput {
    /// Stellar public key owning the on-chain slot.
    #[serde(alias = "stellarPublicKey")]
    pub account_id: String,

    /// Raw account role; must be 1, 2 or 3.
    pub account_type: u32,

    /// Display name.
    pub display_name: String,

    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,

    /// Avatar URL.
    #[serde(default)]
    pub avatar_url: Option<String>,

    /// Free-form extra profile data.
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// The document stored in the content-addressed store.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfilePayload<'a> {
    account_type: AccountType,
    stellar_public_key: &'a str,
    display_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a serde_json::Map<String, serde_json::Value>>,
}

/// What the caller's wallet needs to sign the write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedUpdate {
    /// Data key of the profile slot.
    pub data_key: String,

    /// Base64 XDR of the new on-chain value.
    pub data_value_xdr: String,

    /// Content address of the uploaded payload.
    pub data_hash: String,
}

/// Result of relaying a signed write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubmitReceipt {
    /// Transaction hash reported by the ledger.
    pub hash: String,
}

/// Orchestrates validation, cooldown, upload, encoding and cache mirroring.
pub struct ProfileSyncService {
    config: SyncConfig,
    chain: OnChainProfiles,
    content: Arc<dyn ContentStore>,
    cache: Arc<dyn ProfileCache>,
    clock: Arc<dyn Clock>,
}

impl ProfileSyncService {
    /// Create a service on the system clock.
    pub fn new(
        config: SyncConfig,
        ledger: Arc<dyn LedgerClient>,
        content: Arc<dyn ContentStore>,
        cache: Arc<dyn ProfileCache>,
    ) -> Result<Self, ProfileError> {
        config.validate()?;
        let chain = OnChainProfiles::new(ledger, config.data_key.clone());
        Ok(Self {
            config,
            chain,
            content,
            cache,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Active settings.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The on-chain reader/writer.
    pub fn on_chain(&self) -> &OnChainProfiles {
        &self.chain
    }

    /// Prepare a profile update for external signing.
    ///
    /// Validates the input, enforces the cooldown against the stored record,
    /// uploads the payload, encodes the new record and returns the unsigned
    /// write. The cache row is refreshed once the write has been built.
    pub async fn update_profile(
        &self,
        user_id: &str,
        input: UpdateProfileInput,
    ) -> Result<PreparedUpdate, ProfileError> {
        let account_type = AccountType::try_from(input.account_type)?;
        let account_id = input.account_id.trim();
        validate_input(account_id, &input)?;
        emit_stage(user_id, account_id, UpdateStage::Start);

        let existing = self.chain.get_on_chain_profile(account_id).await?;
        let now = self.clock.now_secs();
        if let Some(existing) = &existing {
            let age = existing.age_at(now);
            if age < self.config.cooldown_secs {
                let retry_after_secs = self.config.cooldown_secs - age;
                emit_rate_limited(user_id, account_id, retry_after_secs);
                return Err(ProfileError::RateLimited { retry_after_secs });
            }
        }
        emit_stage(user_id, account_id, UpdateStage::RateLimitChecked);

        let payload = ProfilePayload {
            account_type,
            stellar_public_key: account_id,
            display_name: input.display_name.trim(),
            email: input.email.as_deref(),
            avatar_url: input.avatar_url.as_deref(),
            metadata: input.metadata.as_ref(),
        };
        let profile_json = serde_json::to_value(&payload)
            .map_err(|e| ProfileError::InvalidInput(e.to_string()))?;
        let body = serde_json::to_vec(&profile_json)
            .map_err(|e| ProfileError::InvalidInput(e.to_string()))?;

        let data_hash = self
            .content
            .put(body)
            .await
            .map_err(|e| ProfileError::StoreUnavailable(e.to_string()))?;
        emit_stage(user_id, account_id, UpdateStage::PayloadStored);

        if data_hash.len() > MAX_HASH_LENGTH {
            return Err(ProfileError::HashTooLarge {
                len: data_hash.len(),
                max: MAX_HASH_LENGTH,
            });
        }

        // Never stamp a record earlier than the one it replaces.
        let updated_at = existing.map_or(now, |r| now.max(r.updated_at));
        let record = ProfileRecord::new(account_type, updated_at, data_hash.clone());
        let data_value_xdr = codec::encode_base64(&record)?;
        emit_stage(user_id, account_id, UpdateStage::RecordEncoded);

        let unsigned = self.chain.unsigned_update(account_id, data_value_xdr);
        emit_stage(user_id, account_id, UpdateStage::TransactionBuilt);

        let created_at = self
            .cache
            .find_by_user(user_id)
            .await?
            .map_or(now, |row| row.created_at);
        self.cache
            .upsert(CachedProfile {
                user_id: user_id.to_string(),
                account_id: account_id.to_string(),
                account_type,
                data_hash: data_hash.clone(),
                display_name: input.display_name.trim().to_string(),
                email: input.email,
                avatar_url: input.avatar_url,
                profile_json,
                created_at,
                synced_at: now,
            })
            .await?;

        emit_update_prepared(user_id, account_id, &data_hash);
        Ok(PreparedUpdate {
            data_key: unsigned.data_key,
            data_value_xdr: unsigned.data_value_xdr,
            data_hash,
        })
    }

    /// Relay a wallet-signed transaction to the ledger.
    pub async fn submit_on_chain_update(
        &self,
        signed_xdr: &str,
    ) -> Result<SubmitReceipt, ProfileError> {
        let envelope = SignedEnvelope::from_base64(signed_xdr)?;
        let hash = self.chain.submit(&envelope).await?;
        emit_update_submitted(&hash);
        Ok(SubmitReceipt { hash })
    }

    /// The cached profile for `user_id`.
    pub async fn get_profile(&self, user_id: &str) -> Result<CachedProfile, ProfileError> {
        self.cache
            .find_by_user(user_id)
            .await?
            .ok_or(ProfileError::ProfileNotFound)
    }
}

fn validate_input(account_id: &str, input: &UpdateProfileInput) -> Result<(), ProfileError> {
    if !validate_account_id(account_id) {
        return Err(ProfileError::InvalidAccountId(account_id.to_string()));
    }
    if !validate_display_name(&input.display_name) {
        return Err(ProfileError::InvalidInput(
            "display name must not be empty".to_string(),
        ));
    }
    if let Some(email) = &input.email {
        if !validate_email(email) {
            return Err(ProfileError::InvalidInput(format!("invalid email {email:?}")));
        }
    }
    if let Some(avatar_url) = &input.avatar_url {
        if !validate_url(avatar_url) {
            return Err(ProfileError::InvalidInput(format!(
                "invalid avatar url {avatar_url:?}"
            )));
        }
    }
    Ok(())
}
