//! Handler-visible projections. These are the types user-supplied callbacks
//! see and return; they deliberately drop everything about the wire event
//! (signature, ephemeral keys, ciphertext) that a handler author has no use
//! for.

use serde::{Deserialize, Serialize};

/// The public request for bids, as seen by the decision handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ask {
    pub id: String,
    pub pubkey: String,
    pub content: String,
    pub created_at: i64,
    pub tags: Vec<Vec<String>>,
}

/// What the decision handler returns for a given ask: either it passes, or
/// it offers a priced bid.
#[derive(Debug, Clone)]
pub enum BidDecision {
    NoBid,
    Offer(BidOffer),
}

/// A priced offer to answer an ask. `bid_sats` is the price in satoshis
/// (converted to millisats before `make_invoice`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidOffer {
    pub content: String,
    pub bid_sats: u64,
    /// Extra tags appended to the Bid Payload beyond `invoice`/`relay`.
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
}

/// A decrypted, payment-verified question, as seen by the answer handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub content: String,
    pub tags: Vec<Vec<String>>,
}

/// What the answer handler returns for a given turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerDraft {
    pub content: String,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    /// Positive to offer a paid follow-up turn; absent/zero ends the conversation.
    #[serde(default)]
    pub followup_sats: Option<u64>,
}

/// One prior (question, answer) pair, offered to the answer handler on every
/// turn from the second onward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub question: Question,
    pub answer: AnswerDraft,
}
