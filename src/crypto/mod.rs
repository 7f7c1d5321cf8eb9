//! Cryptographic utilities: canonical record hashing and Ed25519 signing

mod hash;
mod signing;

pub use hash::{
    batch_record_hash, encode_string, transfer_hash, u64_be, Hash256, DOMAIN_BATCH_RECORD,
    DOMAIN_TRANSFER,
};
pub use signing::{
    signature_from_hex, signature_to_hex, verify_signature, ManufacturerKey, SigningError,
};
