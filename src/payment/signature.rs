//! Callback signature verification.
//!
//! The gateway signs `"<order_id>|<payment_id>"` with HMAC-SHA256 keyed by the
//! account secret and sends the digest hex encoded.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").field("secret", &"[REDACTED]").finish()
    }
}

impl SignatureVerifier {
    pub fn new(secret: SecretString) -> Self { Self { secret } }

    /// Check `signature` against the expected digest in constant time.
    ///
    /// Malformed hex is treated as a mismatch.
    pub fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        let Ok(provided) = hex::decode(signature.trim()) else {
            debug!("payment signature is not valid hex");
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes()) else {
            return false;
        };
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        mac.verify_slice(&provided).is_ok()
    }

    /// Hex digest for `order_id|payment_id`, as the gateway would send it.
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        match HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes()) {
            Ok(mut mac) => {
                mac.update(format!("{order_id}|{payment_id}").as_bytes());
                hex::encode(mac.finalize().into_bytes())
            }
            Err(_) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> SignatureVerifier { SignatureVerifier::new(SecretString::from("test-key-secret")) }

    #[test]
    fn test_valid_signature_accepted() {
        let mut mac = HmacSha256::new_from_slice(b"test-key-secret").expect("valid key length");
        mac.update(b"order_ABC|pay_XYZ");
        let signature = hex::encode(mac.finalize().into_bytes());
        assert!(verifier().verify("order_ABC", "pay_XYZ", &signature));
        assert_eq!(verifier().sign("order_ABC", "pay_XYZ"), signature);
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let v = verifier();
        let signature = v.sign("order_ABC", "pay_XYZ");
        let mut tampered = signature.clone().into_bytes();
        tampered[0] = if tampered[0] == b'a' { b'b' } else { b'a' };
        let tampered = String::from_utf8(tampered).unwrap();
        assert!(!v.verify("order_ABC", "pay_XYZ", &tampered));
        assert!(!v.verify("order_ABC", "pay_OTHER", &signature));
        assert!(!v.verify("order_ABC", "pay_XYZ", "zz-not-hex"));
        assert!(!v.verify("order_ABC", "pay_XYZ", ""));
    }

    #[test]
    fn test_other_secret_rejected() {
        let other = SignatureVerifier::new(SecretString::from("different-secret"));
        let signature = other.sign("order_ABC", "pay_XYZ");
        assert!(!verifier().verify("order_ABC", "pay_XYZ", &signature));
    }
}
