//! Webhook signature verification using HMAC-SHA256.
//!
//! Providers sign the raw request body and send the hex digest in a header,
//! either bare or prefixed with `sha256=`. Verification is the first gate in
//! webhook processing: a payload failing it is rejected before normalization
//! ever runs. With no secret configured the gate is open and every payload
//! passes.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Parse a signature header value into raw digest bytes.
///
/// Accepts bare hex and the `sha256=` prefix. A `sha1=` prefix is stripped
/// with a warning and still verified as HMAC-SHA256, matching how some
/// providers mislabel the header. Returns `None` for invalid hex.
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_digest = if let Some(rest) = header.strip_prefix("sha256=") {
        rest
    } else if let Some(rest) = header.strip_prefix("sha1=") {
        tracing::warn!("Received sha1-prefixed signature, verifying as HMAC-SHA256");
        rest
    } else {
        header
    };
    hex::decode(hex_digest).ok()
}

/// Compute the HMAC-SHA256 digest of a payload.
///
/// Useful for generating expected signatures in tests and tooling.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    // HMAC-SHA256 accepts keys of any length, so this cannot fail.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return Vec::new();
    };
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Format a digest as a `sha256=<hex>` header value.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}

/// Verify a webhook payload against its signature header.
///
/// - no secret configured: verification is skipped, the payload passes;
/// - secret configured, header missing or malformed: rejected;
/// - otherwise: constant-time HMAC comparison.
pub fn verify_signature(payload: &[u8], header: Option<&str>, secret: Option<&[u8]>) -> bool {
    let Some(secret) = secret else {
        return true;
    };
    let Some(header) = header else {
        return false;
    };
    let Some(expected) = parse_signature_header(header) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &[u8] = b"{\"incident\":{\"id\":\"i1\"}}";
    const SECRET: &[u8] = b"webhook-secret";

    #[test]
    fn test_round_trip_with_prefix() {
        let header = format_signature_header(&compute_signature(PAYLOAD, SECRET));
        assert!(verify_signature(PAYLOAD, Some(&header), Some(SECRET)));
    }

    #[test]
    fn test_bare_hex_accepted() {
        let header = hex::encode(compute_signature(PAYLOAD, SECRET));
        assert!(verify_signature(PAYLOAD, Some(&header), Some(SECRET)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let header = format_signature_header(&compute_signature(PAYLOAD, SECRET));
        assert!(!verify_signature(PAYLOAD, Some(&header), Some(b"other-secret")));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let header = format_signature_header(&compute_signature(PAYLOAD, SECRET));
        assert!(!verify_signature(b"{}", Some(&header), Some(SECRET)));
    }

    #[test]
    fn test_missing_header_rejected_when_secret_configured() {
        assert!(!verify_signature(PAYLOAD, None, Some(SECRET)));
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(!verify_signature(PAYLOAD, Some("sha256=zzzz"), Some(SECRET)));
    }

    #[test]
    fn test_no_secret_skips_verification() {
        assert!(verify_signature(PAYLOAD, None, None));
        assert!(verify_signature(PAYLOAD, Some("garbage"), None));
    }

    #[test]
    fn test_sha1_prefix_still_verified_as_sha256() {
        let digest = hex::encode(compute_signature(PAYLOAD, SECRET));
        let header = format!("sha1={digest}");
        assert!(verify_signature(PAYLOAD, Some(&header), Some(SECRET)));
    }
}
