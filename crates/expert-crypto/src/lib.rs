//! expert-crypto
//!
//! The Event Codec: build/sign/verify protocol events, NIP-44 pairwise
//! authenticated encryption, and payment-preimage hashing. Pure and
//! synchronous — this crate performs no I/O.

pub mod codec;
pub mod error;
pub mod keys;
pub mod nip44;
pub mod preimage;

pub use error::CryptoError;
pub use keys::Keypair;
