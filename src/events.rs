//! Structured log events for profile synchronization.
//!
//! Payload bodies and envelopes are never logged, only identifiers and
//! hashes.

use tracing::{debug, info, warn};

use crate::codec::DecodeError;
use crate::service::UpdateStage;
use crate::ProfileError;

/// Emit an event when an update attempt moves to a new stage.
pub fn emit_stage(user_id: &str, account_id: &str, stage: UpdateStage) {
    debug!(user_id, account_id, stage = ?stage, "profile update stage");
}

/// Emit an event when an account has no stored profile.
pub fn emit_profile_absent(account_id: &str) {
    debug!(account_id, "no on-chain profile, first write");
}

/// Emit an event when a stored profile cannot be decoded.
pub fn emit_on_chain_corruption(account_id: &str, err: &DecodeError) {
    warn!(account_id, error = %err, "on-chain profile failed to decode");
}

/// Emit an event when an update is refused by the cooldown.
pub fn emit_rate_limited(user_id: &str, account_id: &str, retry_after_secs: u64) {
    warn!(user_id, account_id, retry_after_secs, "profile update rate limited");
}

/// Emit an event when an unsigned update has been handed out.
pub fn emit_update_prepared(user_id: &str, account_id: &str, data_hash: &str) {
    info!(user_id, account_id, data_hash, "profile update prepared for signing");
}

/// Emit an event when a signed update was accepted by the ledger.
pub fn emit_update_submitted(tx_hash: &str) {
    info!(tx_hash, stage = ?UpdateStage::Submitted, "profile update submitted");
}

/// Emit an event when the ledger refused or could not take a submission.
pub fn emit_submission_failed(err: &ProfileError) {
    warn!(error = %err, code = err.code(), "profile update submission failed");
}
