//! Pure authenticity checks
//!
//! No mutable state: the scratch comparison is timing-safe and the signature
//! check recomputes the canonical encoding from the stored immutable fields.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::crypto::{batch_record_hash, verify_signature};
use crate::domain::{Batch, ScratchSecret};

/// Constant-time scratch card comparison.
///
/// Both values are hashed before comparison so neither length nor prefix of
/// the stored secret leaks through response latency.
pub fn scratch_matches(stored: &ScratchSecret, presented: &str) -> bool {
    let stored_digest: [u8; 32] = Sha256::digest(stored.expose().as_bytes()).into();
    let presented_digest: [u8; 32] = Sha256::digest(presented.as_bytes()).into();
    bool::from(stored_digest.ct_eq(&presented_digest))
}

/// Recompute the canonical immutable-field encoding of the stored record and
/// verify the signature captured at creation.
pub fn signature_valid(batch: &Batch) -> bool {
    let record_hash = batch_record_hash(
        &batch.batch_id,
        &batch.name,
        &batch.manufacturer,
        batch.manufacture_date,
        batch.expiry_date,
    );
    verify_signature(&batch.manufacturer_pubkey, &record_hash, &batch.signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ManufacturerKey;
    use crate::domain::{BatchState, LedgerRefs};
    use chrono::Utc;

    fn signed_batch(key: &ManufacturerKey) -> Batch {
        let record_hash = batch_record_hash("B1", "Paracetamol", "0xM", 100, 200);
        Batch {
            batch_id: "B1".to_string(),
            name: "Paracetamol".to_string(),
            manufacturer: "0xM".to_string(),
            manufacture_date: 100,
            expiry_date: 200,
            scratch_secret: ScratchSecret::new("S1"),
            current_owner: "0xM".to_string(),
            state: BatchState::Created,
            signature: key.sign(&record_hash),
            manufacturer_pubkey: key.public_key_bytes(),
            ledger_refs: LedgerRefs::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn scratch_match_exact_only() {
        let stored = ScratchSecret::new("SCRATCH-42");
        assert!(scratch_matches(&stored, "SCRATCH-42"));
        assert!(!scratch_matches(&stored, "SCRATCH-4"));
        assert!(!scratch_matches(&stored, "SCRATCH-42 "));
        assert!(!scratch_matches(&stored, ""));
    }

    #[test]
    fn scratch_match_handles_length_mismatch() {
        let stored = ScratchSecret::new("short");
        assert!(!scratch_matches(&stored, "a-much-longer-presented-value"));
    }

    #[test]
    fn signature_valid_for_untampered_record() {
        let key = ManufacturerKey::generate();
        let batch = signed_batch(&key);
        assert!(signature_valid(&batch));
    }

    #[test]
    fn signature_invalid_after_field_tampering() {
        let key = ManufacturerKey::generate();
        let mut batch = signed_batch(&key);
        batch.name = "Counterfeit".to_string();
        assert!(!signature_valid(&batch));
    }

    #[test]
    fn signature_check_ignores_mutable_fields() {
        let key = ManufacturerKey::generate();
        let mut batch = signed_batch(&key);
        batch.current_owner = "0xDistributor".to_string();
        batch.state = BatchState::Shipped;
        assert!(signature_valid(&batch));
    }
}
