use async_trait::async_trait;

use crate::error::PaymentBackendError;

/// Result of minting an invoice: a BOLT-11-style payment request string and
/// its hex-encoded payment hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceHandle {
    pub invoice: String,
    pub payment_hash: String,
}

/// Result of a settlement lookup. `settled_at` is a unix-seconds timestamp,
/// positive iff the invoice has been paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceStatus {
    pub settled_at: Option<i64>,
}

impl InvoiceStatus {
    pub fn is_paid(&self) -> bool {
        self.settled_at.is_some_and(|t| t > 0)
    }
}

/// Abstracts a Lightning-style wallet. The only place the core performs
/// Lightning I/O; everything else in `expert-agent` only ever sees
/// `InvoiceHandle`/`InvoiceStatus`.
#[async_trait]
pub trait PaymentBackend: Send + Sync {
    /// Mint an invoice for `amount_msat` millisatoshis with the given
    /// description. Fails with `PaymentBackendError` on transport/remote
    /// failure.
    async fn make_invoice(
        &self,
        amount_msat: u64,
        description: &str,
    ) -> Result<InvoiceHandle, PaymentBackendError>;

    /// Look up settlement status for `payment_hash` (hex-encoded). A
    /// response with `settled_at` absent or non-positive means "not yet
    /// paid"; this is not an error.
    async fn lookup_invoice(
        &self,
        payment_hash: &str,
    ) -> Result<InvoiceStatus, PaymentBackendError>;
}
