//! Protocol event kind numbers. Fixed by the wire spec — must not change.

/// Public request for bids.
pub const ASK: u32 = 20174;
/// Outer, ephemeral-signed envelope carrying an encrypted Bid Payload.
pub const BID: u32 = 20175;
/// Inner, expert-signed offer (never published on its own; only as ciphertext).
pub const BID_PAYLOAD: u32 = 20176;
/// Encrypted question, tagged to a conversation's current context id.
pub const QUESTION: u32 = 20177;
/// Encrypted answer, tagged to the question it answers.
pub const ANSWER: u32 = 20178;
