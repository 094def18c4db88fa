//! NIP-44 v2 pairwise-encrypted payloads: ECDH → HKDF → ChaCha20 +
//! HMAC-SHA256 + length padding, the whole thing base64-encoded as a single
//! opaque string.
//!
//! `encrypt(plaintext, my_secret, their_public)` and
//! `decrypt(ciphertext, my_secret, their_public)` are the only public
//! entry points; everything else here is the fixed wire format that makes
//! this crate interoperable with other implementations on the same relay
//! network.

use base64::{engine::general_purpose::STANDARD, Engine};
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use k256::SecretKey;
use sha2::Sha256;

use crate::error::CryptoError;
use crate::keys::ecdh_shared_x;

const VERSION: u8 = 0x02;
const SALT: &[u8] = b"nip44-v2";
const MIN_PLAINTEXT_LEN: usize = 1;
const MAX_PLAINTEXT_LEN: usize = 65535;

type HmacSha256 = Hmac<Sha256>;

/// Derive the deterministic pairwise conversation key for (my_secret,
/// their_public). Symmetric: `conversation_key(a, B) == conversation_key(b, A)`
/// for `A = pub(a)`, `B = pub(b)`.
fn conversation_key(my_secret: &SecretKey, their_pubkey_hex: &str) -> Result<[u8; 32], CryptoError> {
    let shared_x = ecdh_shared_x(my_secret, their_pubkey_hex)?;
    let (prk, _) = Hkdf::<Sha256>::extract(Some(SALT), &shared_x);
    Ok(prk.into())
}

/// Per-message key material expanded from the conversation key and a
/// per-message random nonce: 32-byte ChaCha20 key, 12-byte ChaCha20 nonce,
/// 32-byte HMAC key.
struct MessageKeys {
    chacha_key: [u8; 32],
    chacha_nonce: [u8; 12],
    hmac_key: [u8; 32],
}

fn expand_message_keys(conversation_key: &[u8; 32], nonce: &[u8; 32]) -> MessageKeys {
    let hk = Hkdf::<Sha256>::from_prk(conversation_key).expect("32-byte PRK is valid length");
    let mut okm = [0u8; 76];
    hk.expand(nonce, &mut okm)
        .expect("76-byte output is within HKDF-SHA256's 8160-byte limit");
    let mut chacha_key = [0u8; 32];
    let mut chacha_nonce = [0u8; 12];
    let mut hmac_key = [0u8; 32];
    chacha_key.copy_from_slice(&okm[0..32]);
    chacha_nonce.copy_from_slice(&okm[32..44]);
    hmac_key.copy_from_slice(&okm[44..76]);
    MessageKeys {
        chacha_key,
        chacha_nonce,
        hmac_key,
    }
}

/// NIP-44's custom padding: a power-of-two-bucketed length scheme that hides
/// the exact plaintext length to a coarser granularity than 1 byte while
/// staying compact for small messages.
fn calc_padded_len(unpadded_len: usize) -> usize {
    if unpadded_len <= 32 {
        return 32;
    }
    let next_power = 1usize << (usize::BITS - (unpadded_len - 1).leading_zeros());
    let chunk = if next_power <= 256 { 32 } else { next_power / 8 };
    chunk * ((unpadded_len - 1) / chunk + 1)
}

fn pad(plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let len = plaintext.len();
    if len < MIN_PLAINTEXT_LEN || len > MAX_PLAINTEXT_LEN {
        return Err(CryptoError::PlaintextLengthOutOfRange(len));
    }
    let padded_len = calc_padded_len(len);
    let mut out = Vec::with_capacity(2 + padded_len);
    out.extend_from_slice(&(len as u16).to_be_bytes());
    out.extend_from_slice(plaintext);
    out.resize(2 + padded_len, 0);
    Ok(out)
}

fn unpad(padded: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if padded.len() < 2 {
        return Err(CryptoError::InvalidPadding);
    }
    let len = u16::from_be_bytes([padded[0], padded[1]]) as usize;
    if len < MIN_PLAINTEXT_LEN || len > MAX_PLAINTEXT_LEN {
        return Err(CryptoError::InvalidPadding);
    }
    let rest = &padded[2..];
    if rest.len() < len || rest.len() != calc_padded_len(len) {
        return Err(CryptoError::InvalidPadding);
    }
    if rest[len..].iter().any(|&b| b != 0) {
        return Err(CryptoError::InvalidPadding);
    }
    Ok(rest[..len].to_vec())
}

/// Encrypt `plaintext` for `their_public` using the conversation key derived
/// from (`my_secret`, `their_public`). Output is a single opaque
/// base64 string: `version(1) || nonce(32) || ciphertext || mac(32)`.
pub fn encrypt(
    plaintext: &str,
    my_secret: &SecretKey,
    their_pubkey_hex: &str,
) -> Result<String, CryptoError> {
    let conv_key = conversation_key(my_secret, their_pubkey_hex)?;
    let nonce: [u8; 32] = rand::random();
    let keys = expand_message_keys(&conv_key, &nonce);

    let mut buf = pad(plaintext.as_bytes())?;
    let mut cipher = ChaCha20::new((&keys.chacha_key).into(), (&keys.chacha_nonce).into());
    cipher.apply_keystream(&mut buf);

    let mut mac = HmacSha256::new_from_slice(&keys.hmac_key)
        .expect("HMAC accepts any key length");
    mac.update(&nonce);
    mac.update(&buf);
    let tag = mac.finalize().into_bytes();

    let mut out = Vec::with_capacity(1 + 32 + buf.len() + 32);
    out.push(VERSION);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&buf);
    out.extend_from_slice(&tag);
    Ok(STANDARD.encode(out))
}

/// Decrypt a payload produced by [`encrypt`]. Fails with [`CryptoError`] on
/// MAC mismatch, bad padding, or version byte mismatch.
pub fn decrypt(
    ciphertext_b64: &str,
    my_secret: &SecretKey,
    their_pubkey_hex: &str,
) -> Result<String, CryptoError> {
    let raw = STANDARD
        .decode(ciphertext_b64)
        .map_err(|e| CryptoError::InvalidBase64(e.to_string()))?;
    if raw.len() < 1 + 32 + 32 {
        return Err(CryptoError::CiphertextTooShort);
    }
    let version = raw[0];
    if version != VERSION {
        return Err(CryptoError::UnsupportedVersion(version));
    }
    let nonce: [u8; 32] = raw[1..33].try_into().expect("slice is exactly 32 bytes");
    let mac_tag = &raw[raw.len() - 32..];
    let body = &raw[33..raw.len() - 32];

    let conv_key = conversation_key(my_secret, their_pubkey_hex)?;
    let keys = expand_message_keys(&conv_key, &nonce);

    let mut mac = HmacSha256::new_from_slice(&keys.hmac_key)
        .expect("HMAC accepts any key length");
    mac.update(&nonce);
    mac.update(body);
    mac.verify_slice(mac_tag).map_err(|_| CryptoError::MacMismatch)?;

    let mut buf = body.to_vec();
    let mut cipher = ChaCha20::new((&keys.chacha_key).into(), (&keys.chacha_nonce).into());
    cipher.apply_keystream(&mut buf);

    let plaintext = unpad(&buf)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidPadding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Keypair;

    #[test]
    fn round_trip_both_directions() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        let plaintext = "what is the capital of the moon?";

        let ct = encrypt(plaintext, &a.secret_key(), &b.public_key_hex()).unwrap();
        let pt = decrypt(&ct, &b.secret_key(), &a.public_key_hex()).unwrap();
        assert_eq!(pt, plaintext);
    }

    #[test]
    fn tampered_ciphertext_fails_mac() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        let ct = encrypt("hello", &a.secret_key(), &b.public_key_hex()).unwrap();
        let mut raw = STANDARD.decode(&ct).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let tampered = STANDARD.encode(raw);
        assert!(decrypt(&tampered, &b.secret_key(), &a.public_key_hex()).is_err());
    }

    #[test]
    fn truncated_mac_fails() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        let ct = encrypt("hello", &a.secret_key(), &b.public_key_hex()).unwrap();
        let raw = STANDARD.decode(&ct).unwrap();
        let truncated = STANDARD.encode(&raw[..raw.len() - 4]);
        assert!(matches!(
            decrypt(&truncated, &b.secret_key(), &a.public_key_hex()),
            Err(CryptoError::MacMismatch)
        ));
    }

    #[test]
    fn bad_version_byte_rejected() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        let ct = encrypt("hello", &a.secret_key(), &b.public_key_hex()).unwrap();
        let mut raw = STANDARD.decode(&ct).unwrap();
        raw[0] = 0x01;
        let bad = STANDARD.encode(raw);
        assert!(matches!(
            decrypt(&bad, &b.secret_key(), &a.public_key_hex()),
            Err(CryptoError::UnsupportedVersion(1))
        ));
    }

    #[test]
    fn wrong_counterpart_cannot_decrypt() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        let eve = Keypair::generate();
        let ct = encrypt("secret bid", &a.secret_key(), &b.public_key_hex()).unwrap();
        assert!(decrypt(&ct, &eve.secret_key(), &a.public_key_hex()).is_err());
    }

    #[test]
    fn padded_len_buckets_small_messages_to_32() {
        assert_eq!(calc_padded_len(1), 32);
        assert_eq!(calc_padded_len(32), 32);
    }

    #[test]
    fn padded_len_grows_in_buckets_above_32() {
        assert!(calc_padded_len(33) >= 33);
        assert_eq!(calc_padded_len(33), 64);
    }
}
