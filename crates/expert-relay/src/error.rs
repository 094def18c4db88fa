use thiserror::Error;

/// Failures at the relay transport boundary. Not part of the turn
/// disposition enum directly — it's the substrate `PublishFailure` and
/// subscription errors in `expert-agent` are built from.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid relay URL {0}: {1}")]
    InvalidUrl(String, String),

    #[error("connection to {0} failed: {1}")]
    ConnectFailed(String, String),

    #[error("connection to {0} closed unexpectedly")]
    ConnectionClosed(String),

    #[error("malformed frame from {0}: {1}")]
    MalformedFrame(String, String),

    #[error("no relays configured for this operation")]
    NoRelays,
}
