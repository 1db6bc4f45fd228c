//! HMAC-SHA256 signatures used by the gateway for payment callbacks and webhooks.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
#[error("invalid signing key: {0}")]
pub struct SignatureError(#[from] hmac::digest::InvalidLength);

/// Hex-encoded HMAC-SHA256 of `payload`.
pub fn sign(secret: &str, payload: &[u8]) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature. Malformed hex never matches.
pub fn verify(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Ok(supplied) = hex::decode(signature.trim()) else { return false };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else { return false };
    mac.update(payload);
    let expected = mac.finalize().into_bytes();
    if supplied.len() != expected.len() {
        return false;
    }
    expected.as_slice().ct_eq(supplied.as_slice()).into()
}

/// Signature the checkout widget returns: HMAC over `"{order_id}|{payment_id}"` keyed by the API secret.
pub fn verify_payment(key_secret: &str, gateway_order_id: &str, payment_id: &str, signature: &str) -> bool {
    verify(key_secret, format!("{}|{}", gateway_order_id, payment_id).as_bytes(), signature)
}

/// Webhook signature: HMAC over the raw request body keyed by the webhook secret.
pub fn verify_webhook(webhook_secret: &str, body: &[u8], signature: &str) -> bool {
    verify(webhook_secret, body, signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        assert_eq!(
            sign("Jefe", b"what do ya want for nothing?").unwrap(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_payment_signature() {
        let sig = sign("secret", b"order_123|pay_456").unwrap();
        assert!(verify_payment("secret", "order_123", "pay_456", &sig));
        assert!(!verify_payment("secret", "order_123", "pay_457", &sig));
        assert!(!verify_payment("other", "order_123", "pay_456", &sig));
    }

    #[test]
    fn test_malformed_signatures_rejected() {
        assert!(!verify("secret", b"body", "not-hex"));
        assert!(!verify("secret", b"body", "abcd"));
        assert!(!verify("secret", b"body", ""));
    }

    #[test]
    fn test_uppercase_hex_accepted() {
        let sig = sign("wh", b"{}").unwrap().to_uppercase();
        assert!(verify_webhook("wh", b"{}", &sig));
    }
}
