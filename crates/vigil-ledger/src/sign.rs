//! Entry signing.
//!
//! Two schemes: HMAC-SHA256 for demo and test deployments (shared key,
//! entries tagged `demo_signed`), and Ed25519 for production, where the
//! exported stream is verifiable offline with the public key alone.

use ed25519_dalek::{Signature, Signer as DalekSigner, SigningKey, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies ledger entries. Scoped to one ledger instance.
pub trait Signer: Send + Sync {
    /// Sign a message, returning the hex-encoded signature.
    fn sign(&self, message: &[u8]) -> String;

    /// Verify a hex-encoded signature over a message.
    fn verify(&self, message: &[u8], signature_hex: &str) -> bool;

    /// Whether entries produced with this signer must be tagged
    /// `demo_signed`.
    fn demo(&self) -> bool;

    /// Scheme name for logging and export metadata.
    fn scheme(&self) -> &'static str;
}

/// Demo-mode signer: HMAC-SHA256 with a shared key.
pub struct HmacSigner {
    key: Vec<u8>,
}

impl HmacSigner {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// Random-keyed signer for demos. The key is logged once so the demo
    /// ledger can still be verified out-of-band.
    pub fn ephemeral() -> Self {
        let mut key = vec![0u8; 32];
        OsRng.fill_bytes(&mut key);
        tracing::warn!(
            key = %hex::encode(&key),
            "demo signing key generated; entries will be tagged demo_signed"
        );
        Self { key }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length")
    }
}

impl Signer for HmacSigner {
    fn sign(&self, message: &[u8]) -> String {
        let mut mac = self.mac();
        mac.update(message);
        hex::encode(mac.finalize().into_bytes())
    }

    fn verify(&self, message: &[u8], signature_hex: &str) -> bool {
        let Ok(signature) = hex::decode(signature_hex) else {
            return false;
        };
        let mut mac = self.mac();
        mac.update(message);
        mac.verify_slice(&signature).is_ok()
    }

    fn demo(&self) -> bool {
        true
    }

    fn scheme(&self) -> &'static str {
        "hmac-sha256"
    }
}

/// Production signer: Ed25519, offline-verifiable given the public key.
pub struct Ed25519Signer {
    signing: SigningKey,
}

impl Ed25519Signer {
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(bytes),
        }
    }

    /// The public key an external verifier needs.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }
}

impl Signer for Ed25519Signer {
    fn sign(&self, message: &[u8]) -> String {
        hex::encode(self.signing.sign(message).to_bytes())
    }

    fn verify(&self, message: &[u8], signature_hex: &str) -> bool {
        let Ok(bytes) = hex::decode(signature_hex) else {
            return false;
        };
        let bytes: [u8; 64] = match bytes.try_into() {
            Ok(b) => b,
            Err(_) => return false,
        };
        let signature = Signature::from_bytes(&bytes);
        self.signing
            .verifying_key()
            .verify(message, &signature)
            .is_ok()
    }

    fn demo(&self) -> bool {
        false
    }

    fn scheme(&self) -> &'static str {
        "ed25519"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_sign_verify_roundtrip() {
        let signer = HmacSigner::new(b"test-key".to_vec());
        let sig = signer.sign(b"message");
        assert!(signer.verify(b"message", &sig));
        assert!(!signer.verify(b"other message", &sig));
        assert!(signer.demo());
    }

    #[test]
    fn hmac_same_key_same_signature() {
        let a = HmacSigner::new(b"shared".to_vec());
        let b = HmacSigner::new(b"shared".to_vec());
        assert_eq!(a.sign(b"m"), b.sign(b"m"));
    }

    #[test]
    fn hmac_rejects_garbage_signature() {
        let signer = HmacSigner::new(b"k".to_vec());
        assert!(!signer.verify(b"m", "not-hex"));
        assert!(!signer.verify(b"m", "deadbeef"));
    }

    #[test]
    fn ed25519_sign_verify_roundtrip() {
        let signer = Ed25519Signer::generate();
        let sig = signer.sign(b"payload");
        assert!(signer.verify(b"payload", &sig));
        assert!(!signer.verify(b"tampered", &sig));
        assert!(!signer.demo());
    }

    #[test]
    fn ed25519_offline_verification_with_public_key() {
        let signer = Ed25519Signer::generate();
        let message = b"exported entry";
        let sig_hex = signer.sign(message);

        // An external verifier holding only the public key.
        let public = signer.verifying_key();
        let bytes: [u8; 64] = hex::decode(sig_hex).unwrap().try_into().unwrap();
        let signature = Signature::from_bytes(&bytes);
        assert!(public.verify(message, &signature).is_ok());
    }

    #[test]
    fn ed25519_deterministic_from_seed() {
        let seed = [7u8; 32];
        let a = Ed25519Signer::from_bytes(&seed);
        let b = Ed25519Signer::from_bytes(&seed);
        assert_eq!(a.sign(b"m"), b.sign(b"m"));
    }
}
