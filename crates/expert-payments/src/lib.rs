//! expert-payments
//!
//! The Payment Gateway Adapter: wraps invoice creation and settlement
//! lookup over Nostr Wallet Connect. The only place the core performs
//! Lightning I/O.

pub mod backend;
pub mod error;
pub mod nwc;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use backend::{InvoiceHandle, InvoiceStatus, PaymentBackend};
pub use error::PaymentBackendError;
pub use nwc::NwcPaymentBackend;
