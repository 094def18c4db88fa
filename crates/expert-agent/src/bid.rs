//! The Bid Pipeline: on an ask, consult the decision handler, mint an
//! invoice, publish a Bid, and — on successful publication — spawn the
//! conversation task that arms it.

use std::sync::Arc;

use expert_core::event::{tag, Event, UnsignedEvent};
use expert_core::{kinds, Ask, BidDecision};
use expert_crypto::keys::Keypair;
use expert_crypto::{codec, nip44};
use tracing::{debug, error, info, warn};

use crate::agent::AgentContext;
use crate::conversation::{self, ConversationState};

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn project_ask(event: &Event) -> Ask {
    Ask {
        id: event.id.clone(),
        pubkey: event.pubkey.clone(),
        content: event.content.clone(),
        created_at: event.created_at,
        tags: event.tags.clone(),
    }
}

/// Handle one inbound Ask event end to end, from decision through spawning
/// the conversation task that arms it. Every early return here is a silent
/// drop or a logged, non-propagated failure — nothing from this function is
/// ever surfaced to the caller of `ExpertAgent::start`/`stop`.
pub(crate) async fn handle_ask(ctx: Arc<AgentContext>, ask_event: Event) {
    // Verify inbound signatures for the Ask — it is a plain, unencrypted
    // public event, so a bad signature is cheap to catch here and saves a
    // wasted invoice mint against a request nobody actually signed. We do
    // not re-verify signatures inside a Question's ciphertext (see
    // `turn::process`): the AEAD tag already authenticates that payload to
    // the session's conversation key, and the outer Question event's own
    // ephemeral signature adds nothing beyond confidentiality the
    // encryption already provides.
    if let Err(e) = codec::verify(&ask_event) {
        debug!(ask_id = %ask_event.id, error = %e, "dropping ask with invalid signature");
        return;
    }

    let ask = project_ask(&ask_event);

    let decision = match ctx.on_ask.on_ask(&ask).await {
        Ok(decision) => decision,
        Err(e) => {
            debug!(ask_id = %ask.id, error = %e, "on_ask handler failed; treating as no-bid");
            return;
        }
    };
    let offer = match decision {
        BidDecision::NoBid => {
            debug!(ask_id = %ask.id, "handler declined to bid");
            return;
        }
        BidDecision::Offer(offer) => offer,
    };

    let bid_key = Keypair::generate();

    let invoice = match ctx
        .payments
        .make_invoice(offer.bid_sats * 1000, &format!("Bid for ask {}", ask.id))
        .await
    {
        Ok(invoice) => invoice,
        Err(e) => {
            error!(ask_id = %ask.id, error = %e, "failed to mint bid invoice; aborting bid");
            return;
        }
    };

    let mut payload_tags = vec![tag("invoice", invoice.invoice.clone())];
    for relay in &ctx.config.question_relays {
        payload_tags.push(tag("relay", relay.clone()));
    }
    payload_tags.extend(offer.tags.clone());

    let unsigned_payload = UnsignedEvent {
        pubkey: ctx.expert_key.public_key_hex(),
        created_at: now(),
        kind: kinds::BID_PAYLOAD,
        tags: payload_tags,
        content: offer.content.clone(),
    };
    let bid_payload = match codec::build_and_sign(unsigned_payload, &ctx.expert_key) {
        Ok(event) => event,
        Err(e) => {
            error!(ask_id = %ask.id, error = %e, "failed to sign bid payload; aborting bid");
            return;
        }
    };

    let payload_json =
        serde_json::to_string(&bid_payload).expect("signed Event serializes cleanly");
    let ciphertext = match nip44::encrypt(&payload_json, &bid_key.secret_key(), &ask_event.pubkey) {
        Ok(ciphertext) => ciphertext,
        Err(e) => {
            error!(ask_id = %ask.id, error = %e, "failed to encrypt bid payload; aborting bid");
            return;
        }
    };

    let unsigned_bid = UnsignedEvent {
        pubkey: bid_key.public_key_hex(),
        created_at: now(),
        kind: kinds::BID,
        tags: vec![tag("e", ask_event.id.clone())],
        content: ciphertext,
    };
    let bid_event = match codec::build_and_sign(unsigned_bid, &bid_key) {
        Ok(event) => event,
        Err(e) => {
            error!(ask_id = %ask.id, error = %e, "failed to sign outer bid event; aborting bid");
            return;
        }
    };
    // `bid_key` is discarded here — the core never needs to decrypt its own
    // bid.

    let outcome = ctx.relay.publish(&ctx.config.ask_relays, bid_event.clone()).await;
    if !outcome.any_accepted() {
        warn!(
            ask_id = %ask.id,
            rejected = outcome.rejected.len(),
            "bid accepted by zero relays; no conversation armed"
        );
        return;
    }

    info!(
        ask_id = %ask.id,
        bid_payload_id = %bid_payload.id,
        accepted = outcome.accepted.len(),
        "bid published"
    );

    let session_pubkey = ask_event.pubkey.clone();
    let conv = ConversationState {
        ask,
        ask_event,
        bid_offer: offer,
        session_pubkey,
        payment_hash: invoice.payment_hash,
        created_at: now(),
        context_id: bid_payload.id.clone(),
        history: Vec::new(),
    };

    let shutdown = ctx.shutdown.clone();
    let task_ctx = ctx.clone();
    let handle = tokio::spawn(async move { conversation::run(task_ctx, conv, shutdown).await });
    ctx.conversation_tasks.lock().unwrap().push(handle);
}
