use thiserror::Error;

/// The aggregate disposition of a single turn. Never returned from `start`/
/// `stop` — used internally to decide what the Question→Answer Pipeline
/// does next and what to log at what level.
#[derive(Debug, Error)]
pub enum TurnError {
    // ── Wrong shape / wrong addressing ───────────────────────────────────────
    #[error("validation failed: {0}")]
    Validation(String),

    // ── Confidentiality ──────────────────────────────────────────────────────
    #[error("decryption failed: {0}")]
    Crypto(#[from] expert_crypto::CryptoError),

    // ── Payment checks ───────────────────────────────────────────────────────
    #[error("preimage does not hash to the conversation's payment hash")]
    PaymentHashMismatch,

    #[error("invoice is not yet settled")]
    PaymentUnsettled,

    #[error("payment backend error: {0}")]
    PaymentBackend(#[from] expert_payments::PaymentBackendError),

    // ── Network ───────────────────────────────────────────────────────────────
    #[error("publish accepted by zero relays")]
    Publish,

    // ── User code ─────────────────────────────────────────────────────────────
    #[error("handler error: {0}")]
    Handler(String),
}

impl TurnError {
    /// The tracing level a turn's abandonment should be logged at. Routine,
    /// expected drops are quiet; a counterparty misbehaving is a warning;
    /// our own I/O failing is an error.
    pub fn log_level(&self) -> tracing::Level {
        match self {
            TurnError::Validation(_) | TurnError::Handler(_) => tracing::Level::DEBUG,
            TurnError::Crypto(_) | TurnError::PaymentHashMismatch | TurnError::PaymentUnsettled => {
                tracing::Level::WARN
            }
            TurnError::PaymentBackend(_) | TurnError::Publish => tracing::Level::ERROR,
        }
    }
}

/// Failure returned by a user-supplied `AskHandler`/`QuestionHandler`. These
/// are never propagated to the relay network or the caller of `start`/
/// `stop` — a `HandlerError` downgrades the turn to "no bid" / "abandoned"
/// exactly like every other `TurnError` variant (see DESIGN.md).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
