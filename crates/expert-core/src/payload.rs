//! The two plain (non-event) wire payloads carried as ciphertext inside a
//! Question event and an Answer event respectively. Unlike the
//! Bid Payload — which is itself a signed `Event` — these are just JSON
//! objects; nothing signs them individually, since the outer Question/Answer
//! event's signature (by an ephemeral key) is all the wire format offers,
//! and the AEAD ciphertext they travel in is what actually authenticates
//! them to the holder of the matching conversation key.

use serde::{Deserialize, Serialize};

/// JSON-encoded inside a Question event's ciphertext. `tags` carries the
/// `preimage` tag the Question→Answer Pipeline checks against the
/// Conversation's payment hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPayload {
    pub content: String,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
}

/// JSON-encoded inside an Answer event's ciphertext. When the expert offers
/// a paid follow-up, an `invoice` tag is appended here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerPayload {
    pub content: String,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
}
