//! HMAC-SHA256 request signing shared by the venue REST clients

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::adapters::errors::{ExchangeError, ExchangeResult};

type HmacSha256 = Hmac<Sha256>;

/// Sign `message` with `secret` and return the lowercase hex digest
pub fn hmac_sha256_hex(secret: &str, message: &str) -> ExchangeResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Authentication(format!("invalid HMAC key: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc4231_case_2() {
        // RFC 4231 test case 2
        let sig = hmac_sha256_hex("Jefe", "what do ya want for nothing?").unwrap();
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_signature_is_hex_and_stable() {
        let a = hmac_sha256_hex("secret", "1700000000000GET/api/v1/account").unwrap();
        let b = hmac_sha256_hex("secret", "1700000000000GET/api/v1/account").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_different_secret_changes_signature() {
        let a = hmac_sha256_hex("one", "payload").unwrap();
        let b = hmac_sha256_hex("two", "payload").unwrap();
        assert_ne!(a, b);
    }
}
