//! Hash-preimage verification for payment receipts.
//! Both inputs are hex-encoded on the wire, per the Lightning convention.

use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// Returns `true` iff `sha256(preimage_hex)` equals `payment_hash_hex`.
pub fn preimage_matches(preimage_hex: &str, payment_hash_hex: &str) -> Result<bool, CryptoError> {
    let preimage = hex::decode(preimage_hex).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
    let expected =
        hex::decode(payment_hash_hex).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
    let actual = Sha256::digest(&preimage);
    Ok(actual.as_slice() == expected.as_slice())
}
