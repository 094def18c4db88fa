use thiserror::Error;

/// Failures from the Payment Gateway Adapter. The core never distinguishes
/// *why* a wallet call failed beyond this enum — every variant is terminal
/// for the current turn.
#[derive(Debug, Error)]
pub enum PaymentBackendError {
    // ── Connection URI ───────────────────────────────────────────────────────
    #[error("invalid nwc connection string: {0}")]
    InvalidConnectionUri(String),

    // ── Transport ─────────────────────────────────────────────────────────────
    #[error("publishing wallet request failed: {0}")]
    PublishFailed(String),

    #[error("timed out waiting for wallet response")]
    ResponseTimeout,

    #[error("transport error: {0}")]
    Transport(String),

    // ── Response shape ───────────────────────────────────────────────────────
    #[error("malformed wallet response: {0}")]
    MalformedResponse(String),

    #[error("wallet returned an error result: {code}: {message}")]
    WalletError { code: String, message: String },
}
