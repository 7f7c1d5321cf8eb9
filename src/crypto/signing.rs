//! Manufacturer signing keys
//!
//! Ed25519 keys used to sign the canonical batch record at creation and the
//! canonical transfer encoding on each custody transfer.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::crypto::hash::Hash256;
use crate::domain::{PublicKey32, Signature64};

/// Error type for signing operations
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("invalid signature format")]
    InvalidSignatureFormat,

    #[error("invalid public key format")]
    InvalidPublicKeyFormat,

    #[error("signature verification failed")]
    VerificationFailed,
}

/// Manufacturer Ed25519 keypair
#[derive(Clone)]
pub struct ManufacturerKey {
    signing_key: SigningKey,
}

impl ManufacturerKey {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create from secret key bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// Secret key bytes
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Public key bytes
    pub fn public_key_bytes(&self) -> PublicKey32 {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Sign a canonical record hash
    pub fn sign(&self, record_hash: &Hash256) -> Signature64 {
        self.signing_key.sign(record_hash).to_bytes()
    }
}

impl std::fmt::Debug for ManufacturerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManufacturerKey")
            .field("public_key", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

/// Verify a signature over a canonical record hash.
pub fn verify_signature(
    public_key: &PublicKey32,
    record_hash: &Hash256,
    signature: &Signature64,
) -> Result<(), SigningError> {
    let verifying_key =
        VerifyingKey::from_bytes(public_key).map_err(|_| SigningError::InvalidPublicKeyFormat)?;
    let sig = Signature::from_bytes(signature);
    verifying_key
        .verify(record_hash, &sig)
        .map_err(|_| SigningError::VerificationFailed)
}

/// Convert signature bytes to hex string with 0x prefix
pub fn signature_to_hex(signature: &Signature64) -> String {
    format!("0x{}", hex::encode(signature))
}

/// Parse signature from hex string (with or without 0x prefix)
pub fn signature_from_hex(hex_str: &str) -> Result<Signature64, SigningError> {
    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    let bytes = hex::decode(hex_str).map_err(|_| SigningError::InvalidSignatureFormat)?;
    bytes
        .try_into()
        .map_err(|_| SigningError::InvalidSignatureFormat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::batch_record_hash;

    #[test]
    fn sign_and_verify_roundtrip() {
        let key = ManufacturerKey::generate();
        let hash = batch_record_hash("B1", "Paracetamol", "0xM", 100, 200);
        let signature = key.sign(&hash);

        assert!(verify_signature(&key.public_key_bytes(), &hash, &signature).is_ok());

        let other_hash = batch_record_hash("B2", "Paracetamol", "0xM", 100, 200);
        assert!(verify_signature(&key.public_key_bytes(), &other_hash, &signature).is_err());
    }

    #[test]
    fn cross_key_verification_fails() {
        let key1 = ManufacturerKey::generate();
        let key2 = ManufacturerKey::generate();
        let hash = [42u8; 32];
        let signature = key1.sign(&hash);
        assert!(verify_signature(&key2.public_key_bytes(), &hash, &signature).is_err());
    }

    #[test]
    fn key_serialization_roundtrip() {
        let original = ManufacturerKey::generate();
        let restored = ManufacturerKey::from_bytes(&original.to_bytes());
        assert_eq!(restored.public_key_bytes(), original.public_key_bytes());
    }

    #[test]
    fn deterministic_signatures() {
        let key = ManufacturerKey::generate();
        let hash = [42u8; 32];
        assert_eq!(key.sign(&hash), key.sign(&hash));
    }

    #[test]
    fn signature_hex_roundtrip() {
        let key = ManufacturerKey::generate();
        let signature = key.sign(&[42u8; 32]);

        let hex_str = signature_to_hex(&signature);
        assert!(hex_str.starts_with("0x"));
        assert_eq!(hex_str.len(), 2 + 128);

        let parsed = signature_from_hex(&hex_str).unwrap();
        assert_eq!(signature, parsed);
        assert_eq!(signature_from_hex(&hex_str[2..]).unwrap(), signature);
    }

    #[test]
    fn debug_redacts_secret_key() {
        let key = ManufacturerKey::generate();
        let rendered = format!("{:?}", key);
        assert!(!rendered.contains(&hex::encode(key.to_bytes())));
    }
}
