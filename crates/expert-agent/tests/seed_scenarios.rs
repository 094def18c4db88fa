//! The six seed end-to-end scenarios, run against `MockRelayMultiplexer` +
//! `MockPaymentBackend` — no real network or Lightning calls anywhere in
//! this file.

mod common;

use expert_core::kinds;
use expert_crypto::keys::Keypair;

use common::*;

fn published_of_kind(mux: &expert_relay::mock::MockRelayMultiplexer, kind: u32) -> Vec<expert_core::Event> {
    mux.published_events().into_iter().filter(|e| e.kind == kind).collect()
}

/// Scenario 1: a bid is accepted and paid, the question is answered, and no
/// follow-up is offered — the conversation ends and the registry empties.
#[tokio::test]
async fn happy_path_no_followup() {
    let harness = start_harness(FixedBidder { bid_sats: 10, decline: false }, None).await;
    let asker = Keypair::generate();

    harness.mux.deliver(ASK_RELAY, build_ask(&asker, "need an expert", "test"));
    settle().await;

    let bids = published_of_kind(&harness.mux, kinds::BID);
    assert_eq!(bids.len(), 1);
    let bid_payload = decrypt_bid_payload(&asker, &bids[0]);
    let context_id = bid_payload.id.clone();
    let invoice_hex = bid_payload.tag_value("invoice").unwrap();
    let payment_hash = extract_payment_hash(&harness.payments, invoice_hex);

    assert_eq!(harness.agent.live_conversation_count(), 1);

    harness.payments.settle(&payment_hash, 1_700_000_000);
    let preimage_hex = harness.payments.preimage_for(&payment_hash).unwrap();

    let question = build_question(
        &asker,
        &harness.expert_key.public_key_hex(),
        &context_id,
        "what is the answer?",
        &preimage_hex,
    );
    harness.mux.deliver(QUESTION_RELAY, question);
    settle().await;

    let answers = published_of_kind(&harness.mux, kinds::ANSWER);
    assert_eq!(answers.len(), 1);
    assert_eq!(
        decrypt_answer_content(&asker, &answers[0]),
        "answer to: what is the answer?"
    );
    assert_eq!(harness.answerer.call_count(), 1);
    assert_eq!(harness.agent.live_conversation_count(), 0);

    harness.agent.stop().await;
}

/// Scenario 2: the question presents a preimage that does not hash to the
/// Conversation's payment hash. No Answer is published.
#[tokio::test]
async fn bad_preimage_is_rejected() {
    let harness = start_harness(FixedBidder { bid_sats: 10, decline: false }, None).await;
    let asker = Keypair::generate();

    harness.mux.deliver(ASK_RELAY, build_ask(&asker, "need an expert", "test"));
    settle().await;

    let bids = published_of_kind(&harness.mux, kinds::BID);
    let bid_payload = decrypt_bid_payload(&asker, &bids[0]);
    let context_id = bid_payload.id.clone();
    let payment_hash = extract_payment_hash(&harness.payments, bid_payload.tag_value("invoice").unwrap());
    harness.payments.settle(&payment_hash, 1_700_000_000);

    let wrong_preimage_hex = hex::encode(b"not the right preimage at all");
    let question = build_question(
        &asker,
        &harness.expert_key.public_key_hex(),
        &context_id,
        "what is the answer?",
        &wrong_preimage_hex,
    );
    harness.mux.deliver(QUESTION_RELAY, question);
    settle().await;

    assert!(published_of_kind(&harness.mux, kinds::ANSWER).is_empty());
    assert_eq!(harness.answerer.call_count(), 0);

    harness.agent.stop().await;
}

/// Scenario 3: the preimage is correct but the invoice has not been settled.
/// No Answer is published and the handler is never invoked.
#[tokio::test]
async fn unpaid_invoice_is_rejected() {
    let harness = start_harness(FixedBidder { bid_sats: 10, decline: false }, None).await;
    let asker = Keypair::generate();

    harness.mux.deliver(ASK_RELAY, build_ask(&asker, "need an expert", "test"));
    settle().await;

    let bids = published_of_kind(&harness.mux, kinds::BID);
    let bid_payload = decrypt_bid_payload(&asker, &bids[0]);
    let context_id = bid_payload.id.clone();
    let payment_hash = extract_payment_hash(&harness.payments, bid_payload.tag_value("invoice").unwrap());
    let preimage_hex = harness.payments.preimage_for(&payment_hash).unwrap();
    // Deliberately not settled.

    let question = build_question(
        &asker,
        &harness.expert_key.public_key_hex(),
        &context_id,
        "what is the answer?",
        &preimage_hex,
    );
    harness.mux.deliver(QUESTION_RELAY, question);
    settle().await;

    assert!(published_of_kind(&harness.mux, kinds::ANSWER).is_empty());
    assert_eq!(harness.answerer.call_count(), 0);

    harness.agent.stop().await;
}

/// Scenario 4: no question ever arrives; the conversation times out and
/// the registry entry is removed.
#[tokio::test]
async fn timeout_with_no_question_clears_the_registry() {
    let expert_key = Keypair::generate();
    let mut config = valid_config(&expert_key);
    config.bid_timeout_secs = 1;
    let harness = start_harness_with_config(
        config,
        expert_key,
        FixedBidder { bid_sats: 10, decline: false },
        None,
    )
    .await;
    let asker = Keypair::generate();

    harness.mux.deliver(ASK_RELAY, build_ask(&asker, "need an expert", "test"));
    settle().await;
    assert_eq!(harness.agent.live_conversation_count(), 1);

    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    assert_eq!(harness.agent.live_conversation_count(), 0);
    assert!(published_of_kind(&harness.mux, kinds::ANSWER).is_empty());

    harness.agent.stop().await;
}

/// Scenario 5: the answer offers a paid follow-up; the conversation re-arms
/// under the Answer's event id, and a second paid question is answered too.
#[tokio::test]
async fn followup_turn_rekeys_the_conversation() {
    let harness = start_harness(FixedBidder { bid_sats: 10, decline: false }, Some(5)).await;
    let asker = Keypair::generate();

    harness.mux.deliver(ASK_RELAY, build_ask(&asker, "need an expert", "test"));
    settle().await;

    let bids = published_of_kind(&harness.mux, kinds::BID);
    let bid_payload = decrypt_bid_payload(&asker, &bids[0]);
    let first_context_id = bid_payload.id.clone();
    let first_payment_hash = extract_payment_hash(&harness.payments, bid_payload.tag_value("invoice").unwrap());
    harness.payments.settle(&first_payment_hash, 1_700_000_000);
    let first_preimage_hex = harness.payments.preimage_for(&first_payment_hash).unwrap();

    let question = build_question(
        &asker,
        &harness.expert_key.public_key_hex(),
        &first_context_id,
        "first question",
        &first_preimage_hex,
    );
    harness.mux.deliver(QUESTION_RELAY, question);
    settle().await;

    let answers = published_of_kind(&harness.mux, kinds::ANSWER);
    assert_eq!(answers.len(), 1);
    let first_answer = &answers[0];
    assert_eq!(harness.agent.live_conversation_count(), 1, "re-armed, not ended");

    let answer_payload_json = {
        let plaintext = expert_crypto::nip44::decrypt(
            &first_answer.content,
            &asker.secret_key(),
            &first_answer.pubkey,
        )
        .unwrap();
        plaintext
    };
    let answer_payload: serde_json::Value = serde_json::from_str(&answer_payload_json).unwrap();
    let followup_invoice = answer_payload["tags"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t[0] == "invoice")
        .map(|t| t[1].as_str().unwrap().to_string())
        .unwrap();
    let second_payment_hash = extract_payment_hash(&harness.payments, &followup_invoice);
    harness.payments.settle(&second_payment_hash, 1_700_000_100);
    let second_preimage_hex = harness.payments.preimage_for(&second_payment_hash).unwrap();

    let second_context_id = first_answer.id.clone();
    let second_question = build_question(
        &asker,
        &harness.expert_key.public_key_hex(),
        &second_context_id,
        "second question",
        &second_preimage_hex,
    );
    harness.mux.deliver(QUESTION_RELAY, second_question);
    settle().await;

    let answers = published_of_kind(&harness.mux, kinds::ANSWER);
    assert_eq!(answers.len(), 2);
    assert_eq!(harness.answerer.call_count(), 2);
    assert_eq!(harness.agent.live_conversation_count(), 0);

    harness.agent.stop().await;
}

/// Scenario 6: after a follow-up rekeys the conversation to the first
/// Answer's id, a Question tagging the *original*, now-stale Bid Payload id
/// matches no live conversation and is silently ignored; the rekeyed
/// conversation stays armed under its new context id.
#[tokio::test]
async fn question_against_pre_rekey_context_id_is_ignored() {
    let harness = start_harness(FixedBidder { bid_sats: 10, decline: false }, Some(5)).await;
    let asker = Keypair::generate();

    harness.mux.deliver(ASK_RELAY, build_ask(&asker, "need an expert", "test"));
    settle().await;

    let bids = published_of_kind(&harness.mux, kinds::BID);
    let bid_payload = decrypt_bid_payload(&asker, &bids[0]);
    let original_context_id = bid_payload.id.clone();
    let first_payment_hash = extract_payment_hash(&harness.payments, bid_payload.tag_value("invoice").unwrap());
    harness.payments.settle(&first_payment_hash, 1_700_000_000);
    let first_preimage_hex = harness.payments.preimage_for(&first_payment_hash).unwrap();

    let first_question = build_question(
        &asker,
        &harness.expert_key.public_key_hex(),
        &original_context_id,
        "first question",
        &first_preimage_hex,
    );
    harness.mux.deliver(QUESTION_RELAY, first_question);
    settle().await;

    let answers = published_of_kind(&harness.mux, kinds::ANSWER);
    assert_eq!(answers.len(), 1, "first turn answered, conversation re-armed for follow-up");
    assert_eq!(harness.agent.live_conversation_count(), 1, "re-armed under the answer's id");

    // A second Question tagging the original (pre-rekey) context id — not
    // the new one the conversation actually moved to — must be dropped.
    let stale_question = build_question(
        &asker,
        &harness.expert_key.public_key_hex(),
        &original_context_id,
        "second question, wrong context id",
        &first_preimage_hex,
    );
    harness.mux.deliver(QUESTION_RELAY, stale_question);
    settle().await;

    assert_eq!(
        published_of_kind(&harness.mux, kinds::ANSWER).len(),
        1,
        "the stale-context question produced no second answer"
    );
    assert_eq!(harness.answerer.call_count(), 1);
    assert_eq!(
        harness.agent.live_conversation_count(),
        1,
        "the rekeyed conversation is still armed under its new context id"
    );

    harness.agent.stop().await;
}

/// Declining the ask (NoBid) publishes nothing and starts no conversation.
#[tokio::test]
async fn declined_ask_publishes_no_bid() {
    let harness = start_harness(FixedBidder { bid_sats: 10, decline: true }, None).await;
    let asker = Keypair::generate();

    harness.mux.deliver(ASK_RELAY, build_ask(&asker, "need an expert", "test"));
    settle().await;

    assert!(published_of_kind(&harness.mux, kinds::BID).is_empty());
    assert_eq!(harness.agent.live_conversation_count(), 0);

    harness.agent.stop().await;
}
