// ============================
// crates/backend-lib/src/signature.rs
// ============================
//! Webhook request signing.
//!
//! Requests carry `x-zm-signature: v0=<hex>` where the digest is
//! HMAC-SHA256 over `v0:<x-zm-request-timestamp>:<raw body>` keyed with the
//! tenant's secret token.
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-zm-signature";
pub const TIMESTAMP_HEADER: &str = "x-zm-request-timestamp";
const VERSION: &str = "v0";

fn mac(secret: &str) -> Result<HmacSha256, AppError> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("HMAC key rejected: {e}")))
}

fn signing_mac(secret: &str, timestamp: &str, body: &[u8]) -> Result<HmacSha256, AppError> {
    let mut mac = mac(secret)?;
    mac.update(VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(mac)
}

/// Signature header value for a request body
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> Result<String, AppError> {
    let digest = signing_mac(secret, timestamp, body)?.finalize().into_bytes();
    Ok(format!("{VERSION}={}", hex::encode(digest)))
}

/// Check a signature header in constant time.
///
/// A missing prefix, a non-hex digest or an unusable secret is simply a
/// mismatch.
pub fn verify_signature(secret: &str, body: &[u8], timestamp: &str, signature: &str) -> bool {
    let Some(digest_hex) = signature.strip_prefix("v0=") else {
        return false;
    };
    let Ok(expected) = hex::decode(digest_hex) else {
        return false;
    };
    let Ok(mac) = signing_mac(secret, timestamp, body) else {
        return false;
    };
    mac.verify_slice(&expected).is_ok()
}

/// Answer to the endpoint validation challenge: hex(HMAC-SHA256(secret, plain_token))
pub fn encrypt_token(secret: &str, plain_token: &str) -> Result<String, AppError> {
    let mut mac = mac(secret)?;
    mac.update(plain_token.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "s3cr3t-key-minimum-length";

    #[test]
    fn test_sign_and_verify() {
        let body = br#"{"event":"meeting.ended"}"#;
        let signature = sign(SECRET, "1700000000", body).unwrap();

        assert!(signature.starts_with("v0="));
        assert_eq!(signature.len(), 3 + 64);
        assert!(verify_signature(SECRET, body, "1700000000", &signature));
    }

    #[test]
    fn test_tampering_is_detected() {
        let body = br#"{"event":"meeting.ended"}"#;
        let signature = sign(SECRET, "1700000000", body).unwrap();

        assert!(!verify_signature(SECRET, b"{}", "1700000000", &signature));
        assert!(!verify_signature(SECRET, body, "1700000001", &signature));
        assert!(!verify_signature("another-secret-of-length", body, "1700000000", &signature));
    }

    #[test]
    fn test_malformed_signature_is_rejected() {
        assert!(!verify_signature(SECRET, b"{}", "1", ""));
        assert!(!verify_signature(SECRET, b"{}", "1", "v0=not-hex"));
        assert!(!verify_signature(SECRET, b"{}", "1", "sha256=00"));
    }

    #[test]
    fn test_encrypt_token_matches_plain_hmac() {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(b"abc");
        let expected = hex::encode(mac.finalize().into_bytes());

        let encrypted = encrypt_token(SECRET, "abc").unwrap();
        assert_eq!(encrypted, expected);
        assert_eq!(encrypted.len(), 64);
        assert!(encrypted.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_any_key_length_is_accepted() {
        let body = b"{}";
        let long = "x".repeat(200);
        for secret in ["", "k", long.as_str()] {
            let signature = sign(secret, "1", body).unwrap();
            assert!(verify_signature(secret, body, "1", &signature));
            assert_eq!(encrypt_token(secret, "abc").unwrap().len(), 64);
        }
    }
}
