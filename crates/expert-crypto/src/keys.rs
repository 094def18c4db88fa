use k256::ecdh::diffie_hellman;
use k256::elliptic_curve::sec1::FromEncodedPoint;
use k256::schnorr::signature::{Signer, Verifier};
use k256::schnorr::{Signature, SigningKey, VerifyingKey};
use k256::{EncodedPoint, PublicKey, SecretKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// An asymmetric keypair over secp256k1, BIP-340 Schnorr flavour. The public
/// half is the 32-byte x-only coordinate used throughout the relay protocol
/// (hex-encoded on the wire).
///
/// Every outbound Bid and every outbound Answer is signed by a freshly
/// generated `Keypair` that is dropped immediately after use — only the
/// expert's one long-term `Keypair` lives for the process.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair. Used for the expert's long-term identity at
    /// startup (from a configured secret) and for the per-event ephemeral
    /// identities minted by the Bid and Question→Answer pipelines.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Parse a keypair from a hex-encoded 32-byte secret scalar. The decoded
    /// bytes are wiped as soon as they're consumed — they're raw secret
    /// material that has no reason to linger in memory past this call.
    pub fn from_hex(secret_hex: &str) -> Result<Self, CryptoError> {
        let bytes: Zeroizing<Vec<u8>> = Zeroizing::new(
            hex::decode(secret_hex).map_err(|e| CryptoError::InvalidHex(e.to_string()))?,
        );
        let signing_key = SigningKey::from_bytes(&bytes)
            .map_err(|e| CryptoError::InvalidSecretKey(e.to_string()))?;
        Ok(Self { signing_key })
    }

    /// The x-only public key, hex-encoded — the form carried in `Event::pubkey`.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign an arbitrary message (the codec signs the 32-byte event id).
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// The underlying secp256k1 secret key, for ECDH shared-secret derivation.
    pub fn secret_key(&self) -> SecretKey {
        SecretKey::from(self.signing_key.as_nonzero_scalar().clone())
    }
}

/// Verify a BIP-340 Schnorr signature given a hex x-only public key.
pub fn verify(pubkey_hex: &str, message: &[u8], sig: &[u8]) -> Result<(), CryptoError> {
    let pk_bytes =
        hex::decode(pubkey_hex).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
    let verifying_key = VerifyingKey::from_bytes(&pk_bytes)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    let signature =
        Signature::try_from(sig).map_err(|_| CryptoError::InvalidSignature)?;
    verifying_key
        .verify(message, &signature)
        .map_err(|_| CryptoError::InvalidSignature)
}

/// Lift an x-only public key (32 bytes) to a full secp256k1 point, per the
/// BIP-340 convention that the implied y-coordinate is even.
fn lift_x(pubkey_x: &[u8]) -> Result<PublicKey, CryptoError> {
    if pubkey_x.len() != 32 {
        return Err(CryptoError::InvalidPublicKey(format!(
            "expected 32-byte x-only key, got {}",
            pubkey_x.len()
        )));
    }
    let mut encoded = [0u8; 33];
    encoded[0] = 0x02;
    encoded[1..].copy_from_slice(pubkey_x);
    let point = EncodedPoint::from_bytes(encoded)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    Option::<PublicKey>::from(PublicKey::from_encoded_point(&point))
        .ok_or_else(|| CryptoError::InvalidPublicKey("point not on curve".to_string()))
}

/// Derive the raw ECDH shared x-coordinate between `my_secret` and the
/// x-only public key `their_pubkey_hex`. This is the shared secret the
/// NIP-44 conversation key is derived from.
pub fn ecdh_shared_x(my_secret: &SecretKey, their_pubkey_hex: &str) -> Result<[u8; 32], CryptoError> {
    let their_bytes =
        hex::decode(their_pubkey_hex).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
    let their_pk = lift_x(&their_bytes)?;
    let shared = diffie_hellman(&my_secret.to_nonzero_scalar(), their_pk.as_affine());
    let mut out = [0u8; 32];
    out.copy_from_slice(shared.raw_secret_bytes().as_slice());
    Ok(out)
}
