//! Binary codec for the on-chain profile value.
//!
//! A [`ProfileRecord`] is stored as a Soroban `ScVal::Map` with four symbol
//! keys, serialized as XDR:
//!
//! | key         | value type    |
//! |-------------|---------------|
//! | `data_hash` | `ScVal::String` |
//! | `type`      | `ScVal::U32`  |
//! | `updated`   | `ScVal::U64`  |
//! | `version`   | `ScVal::String` |
//!
//! Entries are always emitted in the order above, so encoding is a pure
//! function of the record and equal records produce identical bytes.
//! Decoding accepts any entry order but requires exactly these four keys.

use std::collections::BTreeMap;
use std::io::ErrorKind;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use soroban_sdk::xdr::{self, Limits, ReadXdr, ScMap, ScMapEntry, ScSymbol, ScVal, VecM, WriteXdr};
use thiserror::Error;

use crate::fields::{FieldValue, ProfileField};
use crate::profile::{AccountType, ProfileRecord};
use crate::validation::MAX_SYMBOL_LENGTH;

/// Maximum length in bytes of the content hash carried on chain.
pub const MAX_HASH_LENGTH: usize = 128;

/// Maximum length in bytes of the schema version string.
pub const MAX_VERSION_LENGTH: usize = 32;

/// Nesting depth allowed when reading untrusted values.
const MAX_XDR_DEPTH: u32 = 16;

/// Errors produced while encoding a record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A variable-length field exceeds its wire budget.
    #[error("field `{field}` is {len} bytes, limit is {max}")]
    FieldTooLarge {
        /// Key of the offending field.
        field: &'static str,
        /// Actual length in bytes.
        len: usize,
        /// Allowed length in bytes.
        max: usize,
    },

    /// The record has no schema version.
    #[error("profile version must not be empty")]
    EmptyVersion,

    /// The XDR writer refused the value.
    #[error("failed to serialize profile value: {0}")]
    Xdr(String),
}

/// Errors produced while decoding untrusted bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input ended before the declared structure was complete.
    #[error("profile value is truncated")]
    Truncated,

    /// Input is complete but not a valid XDR value.
    #[error("profile value is malformed: {0}")]
    Malformed(String),

    /// Top-level value is not a populated map.
    #[error("profile value is not a map")]
    NotAMap,

    /// Map contains a key outside the profile schema.
    #[error("unexpected key `{0}` in profile value")]
    UnexpectedKey(String),

    /// Map contains the same key twice.
    #[error("duplicate key `{0}` in profile value")]
    DuplicateKey(&'static str),

    /// A required field is absent.
    #[error("profile value is missing field `{0}`")]
    MissingField(&'static str),

    /// A known key carries a value of the wrong type.
    #[error("field `{0}` has the wrong type")]
    TypeMismatch(&'static str),

    /// Account type outside the known roles.
    #[error("invalid account type {0}")]
    InvalidAccountType(u32),

    /// A variable-length field exceeds its wire budget.
    #[error("field `{field}` is {len} bytes, limit is {max}")]
    FieldTooLarge {
        /// Key of the offending field.
        field: &'static str,
        /// Actual length in bytes.
        len: usize,
        /// Allowed length in bytes.
        max: usize,
    },
}

impl From<xdr::Error> for DecodeError {
    fn from(err: xdr::Error) -> Self {
        match err {
            xdr::Error::Io(ref io) if io.kind() == ErrorKind::UnexpectedEof => {
                DecodeError::Truncated
            }
            // The reader is bounded by the input length, so a declared
            // length past the end of input lands here.
            xdr::Error::LengthLimitExceeded => DecodeError::Truncated,
            other => DecodeError::Malformed(other.to_string()),
        }
    }
}

/// Encode a record into XDR bytes.
pub fn encode(record: &ProfileRecord) -> Result<Vec<u8>, EncodeError> {
    to_sc_val(record)?
        .to_xdr(Limits::none())
        .map_err(|e| EncodeError::Xdr(e.to_string()))
}

/// Encode a record into base64 XDR, the form handed to wallets.
pub fn encode_base64(record: &ProfileRecord) -> Result<String, EncodeError> {
    encode(record).map(|bytes| STANDARD.encode(bytes))
}

/// Decode XDR bytes into a record.
pub fn decode(bytes: &[u8]) -> Result<ProfileRecord, DecodeError> {
    let limits = Limits {
        depth: MAX_XDR_DEPTH,
        len: bytes.len(),
    };
    let val = ScVal::from_xdr(bytes, limits)?;
    from_sc_val(&val)
}

/// Decode base64 XDR into a record.
pub fn decode_base64(encoded: &str) -> Result<ProfileRecord, DecodeError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| DecodeError::Malformed(format!("invalid base64: {e}")))?;
    decode(&bytes)
}

/// Build the contract value for a record, entries in canonical order.
pub fn to_sc_val(record: &ProfileRecord) -> Result<ScVal, EncodeError> {
    check_record(record)?;

    let mut entries = Vec::with_capacity(ProfileField::CANONICAL_ORDER.len());
    for field in ProfileField::CANONICAL_ORDER {
        let key = field.symbol().ok_or(EncodeError::FieldTooLarge {
            field: field.key(),
            len: field.key().len(),
            max: MAX_SYMBOL_LENGTH,
        })?;
        let val = field_value(record, field).to_sc_val().ok_or_else(|| {
            EncodeError::Xdr(format!("field `{}` is not representable", field.key()))
        })?;
        entries.push(ScMapEntry { key, val });
    }

    let entries = VecM::try_from(entries).map_err(|e| EncodeError::Xdr(e.to_string()))?;
    Ok(ScVal::Map(Some(ScMap(entries))))
}

/// Read a record out of a contract value.
pub fn from_sc_val(val: &ScVal) -> Result<ProfileRecord, DecodeError> {
    let ScVal::Map(Some(ScMap(entries))) = val else {
        return Err(DecodeError::NotAMap);
    };

    let mut fields = BTreeMap::new();
    for entry in entries.iter() {
        let field = match &entry.key {
            ScVal::Symbol(ScSymbol(name)) => ProfileField::from_key(name.as_slice())
                .ok_or_else(|| {
                    DecodeError::UnexpectedKey(String::from_utf8_lossy(name.as_slice()).into_owned())
                })?,
            _ => return Err(DecodeError::UnexpectedKey("<non-symbol>".to_string())),
        };
        let value =
            FieldValue::from_sc_val(&entry.val).ok_or(DecodeError::TypeMismatch(field.key()))?;
        if fields.insert(field, value).is_some() {
            return Err(DecodeError::DuplicateKey(field.key()));
        }
    }

    let data_hash = take_text(&mut fields, ProfileField::DataHash, MAX_HASH_LENGTH)?;
    let version = take_text(&mut fields, ProfileField::Version, MAX_VERSION_LENGTH)?;
    if version.is_empty() {
        return Err(DecodeError::MissingField(ProfileField::Version.key()));
    }

    let raw_type = take(&mut fields, ProfileField::AccountType)?
        .as_u32()
        .ok_or(DecodeError::TypeMismatch(ProfileField::AccountType.key()))?;
    let account_type =
        AccountType::try_from(raw_type).map_err(|_| DecodeError::InvalidAccountType(raw_type))?;

    let updated_at = take(&mut fields, ProfileField::UpdatedAt)?
        .as_u64()
        .ok_or(DecodeError::TypeMismatch(ProfileField::UpdatedAt.key()))?;

    Ok(ProfileRecord {
        version,
        account_type,
        updated_at,
        data_hash,
    })
}

fn check_record(record: &ProfileRecord) -> Result<(), EncodeError> {
    if record.version.is_empty() {
        return Err(EncodeError::EmptyVersion);
    }
    check_len(ProfileField::Version, &record.version, MAX_VERSION_LENGTH)?;
    check_len(ProfileField::DataHash, &record.data_hash, MAX_HASH_LENGTH)
}

fn check_len(field: ProfileField, value: &str, max: usize) -> Result<(), EncodeError> {
    if value.len() > max {
        return Err(EncodeError::FieldTooLarge {
            field: field.key(),
            len: value.len(),
            max,
        });
    }
    Ok(())
}

fn field_value(record: &ProfileRecord, field: ProfileField) -> FieldValue {
    match field {
        ProfileField::DataHash => FieldValue::Text(record.data_hash.clone()),
        ProfileField::AccountType => FieldValue::U32(record.account_type.as_u32()),
        ProfileField::UpdatedAt => FieldValue::U64(record.updated_at),
        ProfileField::Version => FieldValue::Text(record.version.clone()),
    }
}

fn take(
    fields: &mut BTreeMap<ProfileField, FieldValue>,
    field: ProfileField,
) -> Result<FieldValue, DecodeError> {
    fields
        .remove(&field)
        .ok_or(DecodeError::MissingField(field.key()))
}

fn take_text(
    fields: &mut BTreeMap<ProfileField, FieldValue>,
    field: ProfileField,
    max: usize,
) -> Result<String, DecodeError> {
    match take(fields, field)? {
        FieldValue::Text(text) if text.len() > max => Err(DecodeError::FieldTooLarge {
            field: field.key(),
            len: text.len(),
            max,
        }),
        FieldValue::Text(text) => Ok(text),
        _ => Err(DecodeError::TypeMismatch(field.key())),
    }
}
