//! Shared fixtures for the seed end-to-end scenarios: a fake
//! asker, a fake expert, the two mock adapters, and the wire-level helpers
//! a real client would use to build an Ask and a Question.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use expert_core::event::{tag, UnsignedEvent};
use expert_core::handler::{Ask, AnswerDraft, BidDecision, BidOffer, HistoryTurn, Question};
use expert_core::{kinds, Event, ExpertConfig, QuestionPayload};
use expert_agent::{AskHandler, ExpertAgent, HandlerError, QuestionHandler};
use expert_crypto::keys::Keypair;
use expert_crypto::{codec, nip44};
use expert_payments::mock::MockPaymentBackend;
use expert_relay::mock::MockRelayMultiplexer;

pub const ASK_RELAY: &str = "wss://ask.example";
pub const QUESTION_RELAY: &str = "wss://question.example";

/// `on_ask` that always bids a fixed price with a fixed content, unless
/// told to decline.
pub struct FixedBidder {
    pub bid_sats: u64,
    pub decline: bool,
}

#[async_trait]
impl AskHandler for FixedBidder {
    async fn on_ask(&self, _ask: &Ask) -> Result<BidDecision, HandlerError> {
        if self.decline {
            return Ok(BidDecision::NoBid);
        }
        Ok(BidDecision::Offer(BidOffer {
            content: "I can help with that".to_string(),
            bid_sats: self.bid_sats,
            tags: vec![],
        }))
    }
}

/// `on_question` that records every call it receives and returns a
/// caller-controlled answer (optionally offering a follow-up).
pub struct RecordingAnswerer {
    pub calls: std::sync::Mutex<Vec<(Question, Vec<HistoryTurn>)>>,
    pub followup_sats: Option<u64>,
}

impl RecordingAnswerer {
    pub fn new(followup_sats: Option<u64>) -> Self {
        Self {
            calls: std::sync::Mutex::new(Vec::new()),
            followup_sats,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl QuestionHandler for RecordingAnswerer {
    async fn on_question(
        &self,
        _ask: &Ask,
        _bid: &BidOffer,
        question: &Question,
        history: &[HistoryTurn],
    ) -> Result<AnswerDraft, HandlerError> {
        self.calls
            .lock()
            .unwrap()
            .push((question.clone(), history.to_vec()));
        Ok(AnswerDraft {
            content: format!("answer to: {}", question.content),
            tags: vec![],
            followup_sats: self.followup_sats,
        })
    }
}

pub fn valid_config(expert_key: &Keypair) -> ExpertConfig {
    ExpertConfig {
        nwc_string: "nostr+walletconnect://abc?relay=wss://wallet.example&secret=def".to_string(),
        expert_privkey: hex::encode(expert_key.secret_key().to_bytes()),
        ask_relays: vec![ASK_RELAY.to_string()],
        question_relays: vec![QUESTION_RELAY.to_string()],
        hashtags: vec!["test".to_string()],
        bid_timeout_secs: 600,
    }
}

/// Build and sign a plain Ask event (kind 20174), as a client would.
pub fn build_ask(asker: &Keypair, content: &str, hashtag: &str) -> Event {
    let unsigned = UnsignedEvent {
        pubkey: asker.public_key_hex(),
        created_at: chrono::Utc::now().timestamp(),
        kind: kinds::ASK,
        tags: vec![tag("t", hashtag)],
        content: content.to_string(),
    };
    codec::build_and_sign(unsigned, asker).unwrap()
}

/// Decrypt a Bid event's ciphertext back into the signed Bid Payload
/// `Event`, the way the asker would with its own secret and the Bid's
/// (ephemeral) pubkey.
pub fn decrypt_bid_payload(asker: &Keypair, bid_event: &Event) -> Event {
    let plaintext = nip44::decrypt(&bid_event.content, &asker.secret_key(), &bid_event.pubkey).unwrap();
    serde_json::from_str(&plaintext).unwrap()
}

/// Build and sign a Question event (kind 20177) tagging `context_id`, with
/// ciphertext encrypted for `expert_pubkey` using the asker's secret.
pub fn build_question(
    asker: &Keypair,
    expert_pubkey: &str,
    context_id: &str,
    content: &str,
    preimage_hex: &str,
) -> Event {
    let payload = QuestionPayload {
        content: content.to_string(),
        tags: vec![tag("preimage", preimage_hex)],
    };
    let payload_json = serde_json::to_string(&payload).unwrap();
    let ciphertext = nip44::encrypt(&payload_json, &asker.secret_key(), expert_pubkey).unwrap();
    let unsigned = UnsignedEvent {
        pubkey: asker.public_key_hex(),
        created_at: chrono::Utc::now().timestamp(),
        kind: kinds::QUESTION,
        tags: vec![tag("e", context_id)],
        content: ciphertext,
    };
    codec::build_and_sign(unsigned, asker).unwrap()
}

/// Decrypt an Answer event's ciphertext back into its plain content, the
/// way the asker would with its own secret and the Answer's (ephemeral)
/// pubkey.
pub fn decrypt_answer_content(asker: &Keypair, answer_event: &Event) -> String {
    let plaintext = nip44::decrypt(&answer_event.content, &asker.secret_key(), &answer_event.pubkey).unwrap();
    let value: serde_json::Value = serde_json::from_str(&plaintext).unwrap();
    value["content"].as_str().unwrap().to_string()
}

pub struct Harness {
    pub agent: ExpertAgent,
    pub mux: Arc<MockRelayMultiplexer>,
    pub payments: Arc<MockPaymentBackend>,
    pub expert_key: Keypair,
    pub answerer: Arc<RecordingAnswerer>,
}

pub async fn start_harness(bidder: FixedBidder, followup_sats: Option<u64>) -> Harness {
    let expert_key = Keypair::generate();
    let config = valid_config(&expert_key);
    start_harness_with_config(config, expert_key, bidder, followup_sats).await
}

/// Like [`start_harness`], but with a caller-supplied config (e.g. a short
/// `bid_timeout_secs` for the timeout scenario).
pub async fn start_harness_with_config(
    config: ExpertConfig,
    expert_key: Keypair,
    bidder: FixedBidder,
    followup_sats: Option<u64>,
) -> Harness {
    let mux = Arc::new(MockRelayMultiplexer::new());
    let payments = Arc::new(MockPaymentBackend::new());
    let answerer = Arc::new(RecordingAnswerer::new(followup_sats));

    let agent = ExpertAgent::new(
        config,
        mux.clone(),
        payments.clone(),
        Arc::new(bidder),
        answerer.clone(),
    )
    .unwrap();
    agent.start().await.unwrap();

    Harness {
        agent,
        mux,
        payments,
        expert_key,
        answerer,
    }
}

/// Recover the payment hash behind an invoice string minted by this test's
/// `MockPaymentBackend`, the way a client would decode it off a real BOLT-11
/// invoice.
pub fn extract_payment_hash(harness_payments: &MockPaymentBackend, invoice: &str) -> String {
    harness_payments
        .payment_hash_for_invoice(invoice)
        .expect("invoice was minted by this harness's payment backend")
}

/// Give spawned tasks a chance to run. The test runtime is single-threaded,
/// so a short sleep is enough to let every already-ready task make progress.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
