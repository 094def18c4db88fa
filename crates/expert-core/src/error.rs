use thiserror::Error;

/// Synchronous configuration-validation failures. This is the one place the
/// public API returns an `Err` rather than logging and dropping — everything
/// past `start()` fails by disposition, not by propagating an error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ask_relays must not be empty")]
    EmptyAskRelays,

    #[error("question_relays must not be empty")]
    EmptyQuestionRelays,

    #[error("invalid expert_privkey: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid nwc_string: {0}")]
    InvalidNwcString(String),

    #[error("bid_timeout_secs must be greater than zero")]
    ZeroBidTimeout,
}
