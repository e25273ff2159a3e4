//! Hashing and HMAC helpers for webhook signature verification.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Prefix used by signature headers (`sha256=<hex digest>`).
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Computes HMAC-SHA256 of `body` keyed with `secret`, hex encoded.
pub fn hmac_sha256_hex(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length, new_from_slice cannot fail here.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a `sha256=<hex>` signature header against the raw request body.
///
/// The comparison runs in constant time through `Mac::verify_slice`.
pub fn verify_signature(secret: &str, body: &[u8], header_value: &str) -> bool {
    let Some(hex_digest) = header_value.trim().strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex("test");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_hmac_known_vector() {
        // RFC 4231 test case 2
        let digest = hmac_sha256_hex("Jefe", b"what do ya want for nothing?");
        assert_eq!(
            digest,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_verify_signature_accepts_valid_header() {
        let body = br#"{"from":"+221770000000","text":"bonjour"}"#;
        let header = format!("sha256={}", hmac_sha256_hex("secret", body));
        assert!(verify_signature("secret", body, &header));
    }

    #[test]
    fn test_verify_signature_rejects_tampered_body() {
        let header = format!("sha256={}", hmac_sha256_hex("secret", b"original"));
        assert!(!verify_signature("secret", b"tampered", &header));
    }

    #[test]
    fn test_verify_signature_rejects_malformed_headers() {
        assert!(!verify_signature("secret", b"body", ""));
        assert!(!verify_signature("secret", b"body", "md5=abcd"));
        assert!(!verify_signature("secret", b"body", "sha256=not-hex"));
    }
}
