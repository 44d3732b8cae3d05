//! Profile field keys and their typed wire values.

use soroban_sdk::xdr::{ScString, ScSymbol, ScVal, StringM};

/// The closed set of keys carried by an encoded profile.
///
/// Adding a field means adding a variant here, which forces every match in
/// the codec to account for it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum ProfileField {
    /// Content address of the full profile payload.
    DataHash,
    /// Account role.
    AccountType,
    /// Last write time, seconds since epoch.
    UpdatedAt,
    /// Schema revision.
    Version,
}

impl ProfileField {
    /// All fields in canonical wire order (lexicographic by key).
    pub const CANONICAL_ORDER: [ProfileField; 4] = [
        ProfileField::DataHash,
        ProfileField::AccountType,
        ProfileField::UpdatedAt,
        ProfileField::Version,
    ];

    /// Symbol used as the map key on chain.
    pub fn key(self) -> &'static str {
        match self {
            ProfileField::DataHash => keys::DATA_HASH,
            ProfileField::AccountType => keys::TYPE,
            ProfileField::UpdatedAt => keys::UPDATED,
            ProfileField::Version => keys::VERSION,
        }
    }

    /// Look up a field by its on-chain key.
    pub fn from_key(key: &[u8]) -> Option<Self> {
        Self::CANONICAL_ORDER
            .into_iter()
            .find(|field| field.key().as_bytes() == key)
    }

    /// Build the symbol key for this field.
    pub(crate) fn symbol(self) -> Option<ScVal> {
        StringM::try_from(self.key())
            .ok()
            .map(|name| ScVal::Symbol(ScSymbol(name)))
    }
}

/// Typed field values as they appear on the wire.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldValue {
    /// Variable-length UTF-8 text (version, data hash).
    Text(String),

    /// 32-bit unsigned integer (account type).
    U32(u32),

    /// 64-bit unsigned integer (timestamps).
    U64(u64),
}

impl FieldValue {
    /// Get the text value if this is a `Text`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer value if this is a `U32`.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            FieldValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the integer value if this is a `U64`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert into a contract value. Returns `None` if the text is not
    /// representable as a contract string.
    pub(crate) fn to_sc_val(&self) -> Option<ScVal> {
        match self {
            FieldValue::Text(s) => StringM::try_from(s.as_str())
                .ok()
                .map(|s| ScVal::String(ScString(s))),
            FieldValue::U32(v) => Some(ScVal::U32(*v)),
            FieldValue::U64(v) => Some(ScVal::U64(*v)),
        }
    }

    /// Read a contract value. Returns `None` for any type outside the
    /// three wire types, and for strings that are not valid UTF-8.
    pub(crate) fn from_sc_val(val: &ScVal) -> Option<Self> {
        match val {
            ScVal::String(ScString(s)) => s.to_utf8_string().ok().map(FieldValue::Text),
            ScVal::U32(v) => Some(FieldValue::U32(*v)),
            ScVal::U64(v) => Some(FieldValue::U64(*v)),
            _ => None,
        }
    }
}

/// On-chain key names.
pub mod keys {
    /// Content hash of the off-chain payload.
    pub const DATA_HASH: &str = "data_hash";

    /// Account role.
    pub const TYPE: &str = "type";

    /// Last update time.
    pub const UPDATED: &str = "updated";

    /// Schema revision.
    pub const VERSION: &str = "version";
}
