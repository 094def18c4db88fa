use thiserror::Error;

/// Failures from the Event Codec: key parsing, signing/verification, and the
/// NIP-44 conversation-keyed AEAD. The codec is pure and synchronous (no
/// I/O), so every variant here is a data-shape or crypto failure, never a
/// transport failure.
#[derive(Debug, Error)]
pub enum CryptoError {
    // ── Key parsing ──────────────────────────────────────────────────────────
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    // ── Signing / verification ───────────────────────────────────────────────
    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("event id does not match its content")]
    IdMismatch,

    // ── ECDH ─────────────────────────────────────────────────────────────────
    #[error("ECDH key agreement failed: {0}")]
    EcdhFailed(String),

    // ── NIP-44 payload ───────────────────────────────────────────────────────
    #[error("unsupported NIP-44 version byte: {0}")]
    UnsupportedVersion(u8),

    #[error("ciphertext too short to contain version, nonce, and MAC")]
    CiphertextTooShort,

    #[error("MAC verification failed")]
    MacMismatch,

    #[error("invalid padding")]
    InvalidPadding,

    #[error("plaintext length {0} outside the allowed 1..=65535 range")]
    PlaintextLengthOutOfRange(usize),

    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),
}
