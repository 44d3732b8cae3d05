//! Profile record and account roles.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProfileError;

/// Schema revision written into every encoded record.
pub const CURRENT_VERSION: &str = "1.0";

/// Account role attached to a profile.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
#[repr(u32)]
pub enum AccountType {
    /// Property owner.
    Landlord = 1,
    /// Renter.
    Tenant = 2,
    /// Agent acting for a landlord.
    Agent = 3,
}

impl AccountType {
    /// Wire representation of the role.
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for AccountType {
    type Error = ProfileError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AccountType::Landlord),
            2 => Ok(AccountType::Tenant),
            3 => Ok(AccountType::Agent),
            other => Err(ProfileError::InvalidAccountType(other)),
        }
    }
}

impl From<AccountType> for u32 {
    fn from(value: AccountType) -> Self {
        value.as_u32()
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccountType::Landlord => "landlord",
            AccountType::Tenant => "tenant",
            AccountType::Agent => "agent",
        };
        f.write_str(name)
    }
}

/// The profile value stored in an account's contract data slot.
///
/// Only the content hash of the full profile lives on chain; the payload
/// itself is kept in the content-addressed store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProfileRecord {
    /// Schema revision, e.g. `"1.0"`.
    pub version: String,

    /// Role of the account.
    pub account_type: AccountType,

    /// Seconds since the Unix epoch of the last accepted write.
    pub updated_at: u64,

    /// Content address of the full profile payload.
    pub data_hash: String,
}

impl ProfileRecord {
    /// Create a record at the current schema revision.
    pub fn new(account_type: AccountType, updated_at: u64, data_hash: impl Into<String>) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            account_type,
            updated_at,
            data_hash: data_hash.into(),
        }
    }

    /// Seconds elapsed between this record's write and `now`.
    ///
    /// A record stamped in the future counts as zero elapsed.
    pub fn age_at(&self, now: u64) -> u64 {
        now.saturating_sub(self.updated_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_range() {
        assert_eq!(AccountType::try_from(1).unwrap(), AccountType::Landlord);
        assert_eq!(AccountType::try_from(2).unwrap(), AccountType::Tenant);
        assert_eq!(AccountType::try_from(3).unwrap(), AccountType::Agent);

        for bad in [0u32, 4, 255, u32::MAX] {
            assert!(matches!(
                AccountType::try_from(bad),
                Err(ProfileError::InvalidAccountType(v)) if v == bad
            ));
        }
    }

    #[test]
    fn test_account_type_serde() {
        assert_eq!(serde_json::to_string(&AccountType::Agent).unwrap(), "3");
        let parsed: AccountType = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, AccountType::Tenant);
        assert!(serde_json::from_str::<AccountType>("4").is_err());
    }

    #[test]
    fn test_age_saturates() {
        let record = ProfileRecord::new(AccountType::Tenant, 1_700_000_000, "bafy");
        assert_eq!(record.version, CURRENT_VERSION);
        assert_eq!(record.age_at(1_700_000_060), 60);
        assert_eq!(record.age_at(1_699_999_000), 0);
    }
}
