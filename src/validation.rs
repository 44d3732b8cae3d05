//! Input validation for profile updates.
//!
//! Stellar public keys follow the strkey pattern:
//! - Pattern: ^G[A-Z2-7]{55}$
//! - Length: exactly 56 characters
//! - Starts with `G` (ed25519 public key version byte)
//! - Remaining characters from the RFC 4648 base32 alphabet
//!
//! Contract symbols (used as data keys) are 1-32 characters of
//! `[A-Za-z0-9_]`.
//!
//! Avatar URLs must be `http`, `https` or `ipfs` with something after `://`.

/// Length of an encoded Stellar public key.
pub const ACCOUNT_ID_LENGTH: usize = 56;

/// Maximum symbol length accepted by the contract runtime.
pub const MAX_SYMBOL_LENGTH: usize = 32;

/// URL schemes accepted for profile links.
pub const URL_SCHEMES: [&str; 3] = ["http", "https", "ipfs"];

/// Validate a Stellar public key (`G...`).
///
/// Returns true if the account id has the strkey shape, false otherwise.
/// The checksum is verified by the ledger, not here.
pub fn validate_account_id(account_id: &str) -> bool {
    let bytes = account_id.as_bytes();

    if bytes.len() != ACCOUNT_ID_LENGTH {
        return false;
    }

    if bytes[0] != b'G' {
        return false;
    }

    bytes[1..].iter().all(|&b| is_base32_char(b))
}

/// Validate a contract symbol.
pub fn validate_symbol(symbol: &str) -> bool {
    let len = symbol.len();
    if len == 0 || len > MAX_SYMBOL_LENGTH {
        return false;
    }
    symbol.bytes().all(is_symbol_char)
}

/// Validate a display name: anything with at least one visible character.
pub fn validate_display_name(display_name: &str) -> bool {
    !display_name.trim().is_empty()
}

/// Loose email shape check: `local@domain` with a dot in the domain.
pub fn validate_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return false;
    }

    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Validate a profile link such as an avatar URL.
pub fn validate_url(url: &str) -> bool {
    let Some((scheme, rest)) = url.split_once("://") else {
        return false;
    };

    if !URL_SCHEMES.iter().any(|s| s.eq_ignore_ascii_case(scheme)) {
        return false;
    }

    !rest.is_empty() && !rest.starts_with('/') && !url.chars().any(char::is_whitespace)
}

/// Check if a byte is in the RFC 4648 base32 alphabet (A-Z, 2-7).
#[inline]
fn is_base32_char(b: u8) -> bool {
    b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b)
}

/// Check if a byte is valid inside a contract symbol.
#[inline]
fn is_symbol_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT: &str = "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

    #[test]
    fn test_valid_account_ids() {
        assert!(validate_account_id(ACCOUNT));
        assert!(validate_account_id(
            "GBRPYHIL2CI3FNQ4BXLFMNDLFJUNPU2HY3ZMFSHONUCEOASW7QC7OX2H"
        ));
    }

    #[test]
    fn test_invalid_account_ids() {
        // Wrong length
        assert!(!validate_account_id(""));
        assert!(!validate_account_id(&ACCOUNT[..55]));
        assert!(!validate_account_id(&format!("{ACCOUNT}A")));

        // Wrong version prefix (secret seed / contract)
        assert!(!validate_account_id(&ACCOUNT.replacen('G', "S", 1)));
        assert!(!validate_account_id(&ACCOUNT.replacen('G', "C", 1)));

        // Characters outside base32
        assert!(!validate_account_id(&ACCOUNT.replacen("AA", "A1", 1))); // digit 1
        assert!(!validate_account_id(&ACCOUNT.replacen("AA", "Aa", 1))); // lowercase
    }

    #[test]
    fn test_symbols() {
        assert!(validate_symbol("profile"));
        assert!(validate_symbol("chioma_profile"));
        assert!(validate_symbol(&"a".repeat(MAX_SYMBOL_LENGTH)));

        assert!(!validate_symbol(""));
        assert!(!validate_symbol(&"a".repeat(MAX_SYMBOL_LENGTH + 1)));
        assert!(!validate_symbol("user-profile"));
        assert!(!validate_symbol("user profile"));
    }

    #[test]
    fn test_display_names() {
        assert!(validate_display_name("Chioma"));
        assert!(validate_display_name(" Chioma Nnadi "));
        assert!(!validate_display_name(""));
        assert!(!validate_display_name("   "));
    }

    #[test]
    fn test_emails() {
        assert!(validate_email("chioma@example.com"));
        assert!(validate_email("a.b+c@mail.example.org"));

        assert!(!validate_email("chioma"));
        assert!(!validate_email("@example.com"));
        assert!(!validate_email("chioma@example"));
        assert!(!validate_email("chioma@@example.com"));
        assert!(!validate_email("chi oma@example.com"));
        assert!(!validate_email("chioma@.com"));
    }

    #[test]
    fn test_urls() {
        assert!(validate_url("https://cdn.example.com/avatar.png"));
        assert!(validate_url("http://localhost:8080/a.png"));
        assert!(validate_url("ipfs://bafybeigdyrzt6profilehash"));
        assert!(validate_url("HTTPS://example.com"));

        assert!(!validate_url("avatar.png"));
        assert!(!validate_url("https://"));
        assert!(!validate_url("https:///avatar.png"));
        assert!(!validate_url("ftp://example.com/a.png"));
        assert!(!validate_url("://example.com"));
        assert!(!validate_url("https://example.com/my avatar.png"));
    }
}
