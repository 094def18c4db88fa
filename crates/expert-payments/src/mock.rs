//! An in-memory `PaymentBackend` test double. `make_invoice` mints a
//! deterministic-looking invoice/hash pair and records it; tests mark one
//! settled via [`MockPaymentBackend::settle`]. This is the double the seed
//! end-to-end scenarios are written against.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::backend::{InvoiceHandle, InvoiceStatus, PaymentBackend};
use crate::error::PaymentBackendError;

#[derive(Default)]
struct MockState {
    settled: std::collections::HashMap<String, i64>,
    preimages: std::collections::HashMap<String, String>,
    payment_hashes_by_invoice: std::collections::HashMap<String, String>,
    failing: bool,
}

#[derive(Default)]
pub struct MockPaymentBackend {
    state: Mutex<MockState>,
    counter: AtomicU64,
}

impl MockPaymentBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `payment_hash` as settled at `settled_at` (unix seconds).
    pub fn settle(&self, payment_hash: &str, settled_at: i64) {
        self.state
            .lock()
            .unwrap()
            .settled
            .insert(payment_hash.to_string(), settled_at);
    }

    /// Make every subsequent call fail with a transport error, to exercise
    /// `PaymentBackendError` disposition paths.
    pub fn fail_all(&self) {
        self.state.lock().unwrap().failing = true;
    }

    /// The hex-encoded preimage minted alongside `payment_hash`, if this
    /// backend produced it. A real wallet would never expose this before
    /// the invoice is paid; tests use it to play the payer's role.
    pub fn preimage_for(&self, payment_hash: &str) -> Option<String> {
        self.state.lock().unwrap().preimages.get(payment_hash).cloned()
    }

    /// The payment hash behind an invoice string this backend minted. A
    /// client normally learns the payment hash by decoding the invoice
    /// itself; the mock invoice format carries no such encoding, so tests
    /// recover it here instead.
    pub fn payment_hash_for_invoice(&self, invoice: &str) -> Option<String> {
        self.state.lock().unwrap().payment_hashes_by_invoice.get(invoice).cloned()
    }
}

#[async_trait]
impl PaymentBackend for MockPaymentBackend {
    async fn make_invoice(
        &self,
        amount_msat: u64,
        description: &str,
    ) -> Result<InvoiceHandle, PaymentBackendError> {
        if self.state.lock().unwrap().failing {
            return Err(PaymentBackendError::Transport("mock configured to fail".to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let preimage = format!("mock-preimage-{n}-{description}-{amount_msat}");
        let preimage_hex = hex::encode(preimage.as_bytes());
        let payment_hash = hex::encode(Sha256::digest(preimage.as_bytes()));
        let invoice = format!("lnbc{amount_msat}mock{n}");
        {
            let mut state = self.state.lock().unwrap();
            state.preimages.insert(payment_hash.clone(), preimage_hex);
            state
                .payment_hashes_by_invoice
                .insert(invoice.clone(), payment_hash.clone());
        }
        Ok(InvoiceHandle { invoice, payment_hash })
    }

    async fn lookup_invoice(
        &self,
        payment_hash: &str,
    ) -> Result<InvoiceStatus, PaymentBackendError> {
        if self.state.lock().unwrap().failing {
            return Err(PaymentBackendError::Transport("mock configured to fail".to_string()));
        }
        let settled_at = self.state.lock().unwrap().settled.get(payment_hash).copied();
        Ok(InvoiceStatus { settled_at })
    }
}
