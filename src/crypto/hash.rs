//! Deterministic canonical encoding with domain separation
//!
//! The canonical encoding of a batch record is a fixed binary layout:
//! a domain prefix, then the immutable fields in declaration order, strings
//! length-prefixed and integers big-endian. It never depends on any iteration
//! order derived from mutable storage, so recomputing it over a stored record
//! always reproduces the signed bytes.

use sha2::{Digest, Sha256};

/// 32-byte SHA-256 hash
pub type Hash256 = [u8; 32];

/// Domain prefix for the immutable batch record
pub const DOMAIN_BATCH_RECORD: &[u8] = b"PHARMA_BATCH_RECORD_V1";

/// Domain prefix for custody transfer receipts
pub const DOMAIN_TRANSFER: &[u8] = b"PHARMA_TRANSFER_V1";

/// Encode a u64 as 8 bytes big-endian
#[inline]
pub fn u64_be(n: u64) -> [u8; 8] {
    n.to_be_bytes()
}

/// Encode a string as length-prefixed UTF-8 bytes
/// Format: U32_BE(len) || UTF8_bytes
pub fn encode_string(s: &str) -> Vec<u8> {
    let utf8_bytes = s.as_bytes();
    let mut result = Vec::with_capacity(4 + utf8_bytes.len());
    result.extend_from_slice(&(utf8_bytes.len() as u32).to_be_bytes());
    result.extend_from_slice(utf8_bytes);
    result
}

/// Hash of the canonical immutable-field encoding of a batch record.
///
/// record_hash = SHA256(DOMAIN_BATCH_RECORD ||
///     STR(batch_id) || STR(name) || STR(manufacturer) ||
///     U64_BE(manufacture_date) || U64_BE(expiry_date))
///
/// Dates are Unix seconds; negative timestamps are not meaningful for
/// manufactured goods and are encoded by two's-complement cast.
pub fn batch_record_hash(
    batch_id: &str,
    name: &str,
    manufacturer: &str,
    manufacture_date: i64,
    expiry_date: i64,
) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_BATCH_RECORD);
    hasher.update(encode_string(batch_id));
    hasher.update(encode_string(name));
    hasher.update(encode_string(manufacturer));
    hasher.update(u64_be(manufacture_date as u64));
    hasher.update(u64_be(expiry_date as u64));
    hasher.finalize().into()
}

/// Hash of the canonical transfer encoding.
///
/// transfer_hash = SHA256(DOMAIN_TRANSFER ||
///     STR(batch_id) || STR(kind) || STR(from_owner) || STR(to_owner) ||
///     U64_BE(at_unix_ms))
pub fn transfer_hash(
    batch_id: &str,
    kind: &str,
    from_owner: &str,
    to_owner: &str,
    at_unix_ms: i64,
) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_TRANSFER);
    hasher.update(encode_string(batch_id));
    hasher.update(encode_string(kind));
    hasher.update(encode_string(from_owner));
    hasher.update(encode_string(to_owner));
    hasher.update(u64_be(at_unix_ms as u64));
    hasher.finalize().into()
}
