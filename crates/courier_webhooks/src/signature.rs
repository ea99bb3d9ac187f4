// --- File: crates/courier_webhooks/src/signature.rs ---
//! HMAC verification for signed webhook payloads.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Verify an `X-Hub-Signature-256` style header against the raw body.
///
/// The header carries `sha256=<hex digest>`; comparison happens inside the
/// MAC implementation in constant time.
pub fn verify_signature(app_secret: &str, body: &[u8], header: &str) -> bool {
    let Some(hex_digest) = header.strip_prefix("sha256=") else {
        debug!("Signature header missing sha256= prefix");
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        debug!("Signature header is not valid hex");
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_matching_signature() {
        let body = br#"{"events":[]}"#;
        let header = sign("top-secret", body);
        assert!(verify_signature("top-secret", body, &header));
    }

    #[test]
    fn rejects_wrong_secret_and_malformed_headers() {
        let body = br#"{"events":[]}"#;
        let header = sign("top-secret", body);
        assert!(!verify_signature("other-secret", body, &header));
        assert!(!verify_signature("top-secret", body, "sha1=abcdef"));
        assert!(!verify_signature("top-secret", body, "sha256=zznothex"));
    }

    #[test]
    fn rejects_tampered_body() {
        let header = sign("top-secret", br#"{"events":[]}"#);
        assert!(!verify_signature("top-secret", br#"{"events":[{}]}"#, &header));
    }
}
