//! Build, sign, and verify protocol events.
//!
//! The canonical id is `sha256(JSON([0, pubkey, created_at, kind, tags,
//! content]))` with no inserted whitespace — the common public-key event
//! convention (NIP-01) this protocol borrows wholesale, since interop with
//! other participants on the relay network requires bit-compatible ids.

use expert_core::event::{Event, UnsignedEvent};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::CryptoError;
use crate::keys::Keypair;

fn canonical_id(unsigned: &UnsignedEvent) -> String {
    let json: Value = serde_json::json!([
        0,
        unsigned.pubkey,
        unsigned.created_at,
        unsigned.kind,
        unsigned.tags,
        unsigned.content,
    ]);
    let serialized = serde_json::to_string(&json).expect("event fields are valid JSON");
    hex::encode(Sha256::digest(serialized.as_bytes()))
}

/// Compute the canonical id and Schnorr signature for `unsigned`, returning
/// the signed `Event`. The unsigned event's `pubkey` must already be the hex
/// public key matching `signer`.
pub fn build_and_sign(unsigned: UnsignedEvent, signer: &Keypair) -> Result<Event, CryptoError> {
    if unsigned.pubkey != signer.public_key_hex() {
        return Err(CryptoError::InvalidPublicKey(
            "unsigned event pubkey does not match signer".to_string(),
        ));
    }
    let id = canonical_id(&unsigned);
    let id_bytes = hex::decode(&id).expect("sha256 hex digest decodes cleanly");
    let sig = signer.sign(&id_bytes);
    Ok(Event {
        id,
        pubkey: unsigned.pubkey,
        created_at: unsigned.created_at,
        kind: unsigned.kind,
        tags: unsigned.tags,
        content: unsigned.content,
        sig: hex::encode(sig.to_bytes()),
    })
}

/// Verify that `event`'s id matches its content and that its signature is
/// valid for its signer pubkey. Returns `Ok(())` or the first failure found.
pub fn verify(event: &Event) -> Result<(), CryptoError> {
    let unsigned = UnsignedEvent {
        pubkey: event.pubkey.clone(),
        created_at: event.created_at,
        kind: event.kind,
        tags: event.tags.clone(),
        content: event.content.clone(),
    };
    let expected_id = canonical_id(&unsigned);
    if expected_id != event.id {
        return Err(CryptoError::IdMismatch);
    }
    let id_bytes = hex::decode(&event.id).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
    let sig_bytes = hex::decode(&event.sig).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
    crate::keys::verify(&event.pubkey, &id_bytes, &sig_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use expert_core::event::tag;

    #[test]
    fn build_and_sign_produces_verifiable_event() {
        let signer = Keypair::generate();
        let unsigned = UnsignedEvent {
            pubkey: signer.public_key_hex(),
            created_at: 1_700_000_000,
            kind: 20174,
            tags: vec![tag("t", "test")],
            content: "looking for an expert".to_string(),
        };
        let event = build_and_sign(unsigned, &signer).unwrap();
        assert!(verify(&event).is_ok());
    }

    #[test]
    fn tampered_content_fails_id_check() {
        let signer = Keypair::generate();
        let unsigned = UnsignedEvent {
            pubkey: signer.public_key_hex(),
            created_at: 1_700_000_000,
            kind: 20174,
            tags: vec![],
            content: "original".to_string(),
        };
        let mut event = build_and_sign(unsigned, &signer).unwrap();
        event.content = "tampered".to_string();
        assert!(matches!(verify(&event), Err(CryptoError::IdMismatch)));
    }

    #[test]
    fn mismatched_signer_pubkey_rejected() {
        let signer = Keypair::generate();
        let other = Keypair::generate();
        let unsigned = UnsignedEvent {
            pubkey: other.public_key_hex(),
            created_at: 1_700_000_000,
            kind: 20174,
            tags: vec![],
            content: "x".to_string(),
        };
        assert!(build_and_sign(unsigned, &signer).is_err());
    }
}
