use crate::error::ConfigError;

/// Exactly the recognized initialization options. Handlers are not part of
/// this struct — they are supplied separately as trait objects to the agent
/// constructor, keeping plain data separate from the `Arc<dyn AskHandler>`/
/// `Arc<dyn QuestionHandler>` the agent is built with.
#[derive(Debug, Clone)]
pub struct ExpertConfig {
    /// Payment-backend connection URI (`nostr+walletconnect://...`).
    pub nwc_string: String,
    /// Hex-encoded 32-byte secret scalar for the expert's long-term keypair.
    pub expert_privkey: String,
    /// Relay URLs to listen for asks on.
    pub ask_relays: Vec<String>,
    /// Relay URLs advertised in bid payloads; used for questions and answers.
    pub question_relays: Vec<String>,
    /// Topic tag set. Empty disables the topic subscription.
    pub hashtags: Vec<String>,
    /// Seconds before an armed turn expires.
    pub bid_timeout_secs: u64,
}

impl ExpertConfig {
    pub const DEFAULT_BID_TIMEOUT_SECS: u64 = 600;

    /// Validate the syntactic shape of the configuration. This is the only
    /// place in the public API that fails synchronously; everything past
    /// `start()` fails by disposition, not by returning an error here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ask_relays.is_empty() {
            return Err(ConfigError::EmptyAskRelays);
        }
        if self.question_relays.is_empty() {
            return Err(ConfigError::EmptyQuestionRelays);
        }
        if self.bid_timeout_secs == 0 {
            return Err(ConfigError::ZeroBidTimeout);
        }
        let key_bytes = hex::decode(&self.expert_privkey)
            .map_err(|e| ConfigError::InvalidPrivateKey(e.to_string()))?;
        if key_bytes.len() != 32 {
            return Err(ConfigError::InvalidPrivateKey(format!(
                "expected 32 bytes, got {}",
                key_bytes.len()
            )));
        }
        if !self.nwc_string.starts_with("nostr+walletconnect://") {
            return Err(ConfigError::InvalidNwcString(
                "must start with nostr+walletconnect://".to_string(),
            ));
        }
        Ok(())
    }
}
