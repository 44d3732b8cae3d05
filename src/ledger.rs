//! Reading and writing the on-chain profile slot.
//!
//! Every account keeps its profile under one shared data key. Reads decode
//! the stored value; writes are handed back unsigned, because signing
//! happens in the user's wallet. Signed envelopes come back through
//! [`OnChainProfiles::submit`] and are relayed once, never retried.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use sha2::{Digest, Sha256};
use soroban_sdk::xdr::{Limits, ReadXdr, TransactionEnvelope};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use crate::codec;
use crate::events::{emit_on_chain_corruption, emit_profile_absent, emit_submission_failed};
use crate::profile::ProfileRecord;
use crate::ProfileError;

/// Nesting depth allowed when reading a caller's envelope.
const MAX_ENVELOPE_DEPTH: u32 = 500;

/// Errors from the ledger client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The network refused the request (bad sequence, fee, expiry, failed
    /// simulation).
    #[error("rejected by ledger: {0}")]
    Rejected(String),

    /// Transport failure or timeout.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Access to ledger state and transaction submission.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Read the raw value stored under `key` for `account_id`, if any.
    async fn read_contract_data(
        &self,
        account_id: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, LedgerError>;

    /// Submit a signed transaction and return its hash.
    async fn submit(&self, envelope: &SignedEnvelope) -> Result<String, LedgerError>;
}

/// Write payload for a profile slot, awaiting the owner's signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedUpdate {
    /// Account whose slot is written.
    pub account_id: String,

    /// Data key of the slot.
    pub data_key: String,

    /// Base64 XDR of the encoded profile value.
    pub data_value_xdr: String,
}

/// A caller-signed transaction envelope.
#[derive(Clone, Debug)]
pub struct SignedEnvelope {
    xdr: String,
    bytes: Vec<u8>,
    envelope: TransactionEnvelope,
}

impl SignedEnvelope {
    /// Parse a base64 XDR `TransactionEnvelope` carrying at least one
    /// signature.
    pub fn from_base64(signed_xdr: &str) -> Result<Self, ProfileError> {
        let xdr = signed_xdr.trim();
        if xdr.is_empty() {
            return Err(ProfileError::InvalidEnvelope("empty envelope".to_string()));
        }

        let bytes = STANDARD
            .decode(xdr)
            .map_err(|e| ProfileError::InvalidEnvelope(format!("invalid base64: {e}")))?;

        let limits = Limits {
            depth: MAX_ENVELOPE_DEPTH,
            len: bytes.len(),
        };
        let envelope = TransactionEnvelope::from_xdr(&bytes, limits)
            .map_err(|e| ProfileError::InvalidEnvelope(e.to_string()))?;

        let signed = Self {
            xdr: xdr.to_string(),
            bytes,
            envelope,
        };
        if signed.signature_count() == 0 {
            return Err(ProfileError::InvalidEnvelope(
                "envelope carries no signatures".to_string(),
            ));
        }
        Ok(signed)
    }

    /// The envelope as received.
    pub fn as_base64(&self) -> &str {
        &self.xdr
    }

    /// The decoded XDR bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The decoded envelope.
    pub fn envelope(&self) -> &TransactionEnvelope {
        &self.envelope
    }

    /// Number of signatures attached.
    pub fn signature_count(&self) -> usize {
        match &self.envelope {
            TransactionEnvelope::TxV0(e) => e.signatures.len(),
            TransactionEnvelope::Tx(e) => e.signatures.len(),
            TransactionEnvelope::TxFeeBump(e) => e.signatures.len(),
        }
    }
}

/// Reader/writer for the profile slot of any account.
#[derive(Clone)]
pub struct OnChainProfiles {
    ledger: Arc<dyn LedgerClient>,
    data_key: String,
}

impl OnChainProfiles {
    /// Create a reader/writer using `data_key` as the slot name.
    pub fn new(ledger: Arc<dyn LedgerClient>, data_key: impl Into<String>) -> Self {
        Self {
            ledger,
            data_key: data_key.into(),
        }
    }

    /// The slot name shared by all accounts.
    pub fn data_key(&self) -> &str {
        &self.data_key
    }

    /// Read and decode the account's current record.
    ///
    /// An empty slot is `Ok(None)`. A value that fails to decode is
    /// [`ProfileError::OnChainCorruption`]; no default is substituted.
    pub async fn get_on_chain_profile(
        &self,
        account_id: &str,
    ) -> Result<Option<ProfileRecord>, ProfileError> {
        let stored = self
            .ledger
            .read_contract_data(account_id, &self.data_key)
            .await
            .map_err(|e| ProfileError::LedgerUnavailable(e.to_string()))?;

        let Some(bytes) = stored else {
            emit_profile_absent(account_id);
            return Ok(None);
        };

        match codec::decode(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                emit_on_chain_corruption(account_id, &err);
                Err(ProfileError::OnChainCorruption(err))
            }
        }
    }

    /// Build the unsigned write of `record` into the account's slot.
    pub fn build_unsigned_update(
        &self,
        account_id: &str,
        record: &ProfileRecord,
    ) -> Result<UnsignedUpdate, ProfileError> {
        Ok(self.unsigned_update(account_id, codec::encode_base64(record)?))
    }

    /// Wrap an already encoded value as the unsigned write to this reader's
    /// data key.
    pub fn unsigned_update(&self, account_id: &str, data_value_xdr: String) -> UnsignedUpdate {
        UnsignedUpdate {
            account_id: account_id.to_string(),
            data_key: self.data_key.clone(),
            data_value_xdr,
        }
    }

    /// Relay a signed transaction. Failures are returned as-is; the caller
    /// must re-sign with fresh sequence and time bounds.
    pub async fn submit(&self, envelope: &SignedEnvelope) -> Result<String, ProfileError> {
        self.ledger.submit(envelope).await.map_err(|err| {
            let err = match err {
                LedgerError::Rejected(reason) => ProfileError::SubmissionRejected(reason),
                LedgerError::Unavailable(reason) => ProfileError::SubmissionUnavailable(reason),
            };
            emit_submission_failed(&err);
            err
        })
    }
}

/// In-process ledger holding raw data entries.
///
/// Submitted envelopes are recorded and hashed with SHA-256 of their XDR.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: RwLock<HashMap<(String, String), Vec<u8>>>,
    submitted: Mutex<Vec<String>>,
    failures: Mutex<Vec<LedgerError>>,
    reads: AtomicUsize,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes under `(account_id, key)`.
    pub async fn set_entry(&self, account_id: &str, key: &str, value: Vec<u8>) {
        self.entries
            .write()
            .await
            .insert((account_id.to_string(), key.to_string()), value);
    }

    /// Encode and store a record under `(account_id, key)`.
    pub async fn set_profile(
        &self,
        account_id: &str,
        key: &str,
        record: &ProfileRecord,
    ) -> Result<(), ProfileError> {
        let bytes = codec::encode(record)?;
        self.set_entry(account_id, key, bytes).await;
        Ok(())
    }

    /// Make the next submissions fail with `err`, in order.
    pub async fn fail_next_submit(&self, err: LedgerError) {
        self.failures.lock().await.push(err);
    }

    /// Base64 envelopes accepted so far.
    pub async fn submitted(&self) -> Vec<String> {
        self.submitted.lock().await.clone()
    }

    /// Number of data reads served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn read_contract_data(
        &self,
        account_id: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, LedgerError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .entries
            .read()
            .await
            .get(&(account_id.to_string(), key.to_string()))
            .cloned())
    }

    async fn submit(&self, envelope: &SignedEnvelope) -> Result<String, LedgerError> {
        {
            let mut failures = self.failures.lock().await;
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
        }

        self.submitted
            .lock()
            .await
            .push(envelope.as_base64().to_string());
        Ok(hex::encode(Sha256::digest(envelope.as_bytes())))
    }
}
