use serde::{Deserialize, Serialize};

/// A single relay-protocol event, in the common public-key event shape
/// (NIP-01). `id` and `sig` are hex, `pubkey` is a hex x-only (32-byte)
/// public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u32,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

/// An event before its id and signature have been computed.
#[derive(Debug, Clone)]
pub struct UnsignedEvent {
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u32,
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

impl Event {
    /// First value of the first tag whose name matches `letter` (e.g. "e", "p", "t").
    pub fn tag_value(&self, letter: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.first().map(String::as_str) == Some(letter))
            .and_then(|t| t.get(1))
            .map(String::as_str)
    }

    /// All second-position values across tags named `letter` (e.g. repeated "relay" tags).
    pub fn tag_values(&self, letter: &str) -> Vec<&str> {
        self.tags
            .iter()
            .filter(|t| t.first().map(String::as_str) == Some(letter))
            .filter_map(|t| t.get(1))
            .map(String::as_str)
            .collect()
    }
}

/// Build a `["letter", value]` tag.
pub fn tag(letter: &str, value: impl Into<String>) -> Vec<String> {
    vec![letter.to_string(), value.into()]
}
