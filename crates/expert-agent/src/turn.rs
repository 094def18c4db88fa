//! The Question→Answer Pipeline: validate a single inbound Question event
//! against one Conversation's state, verify payment, invoke the answer
//! handler, and publish the Answer.
//!
//! Split out from [`crate::conversation`] so the arming/timeout/shutdown
//! loop and the actual turn logic can be read (and tested) independently —
//! transition rules kept apart from the storage they operate on.

use std::sync::Arc;

use expert_core::event::{tag, UnsignedEvent};
use expert_core::{kinds, AnswerPayload, Event, HistoryTurn, Question, QuestionPayload};
use expert_crypto::keys::Keypair;
use expert_crypto::{codec, nip44, preimage};
use tracing::{info, warn};

use crate::agent::AgentContext;
use crate::conversation::ConversationState;
use crate::error::TurnError;

pub(crate) enum TurnOutcome {
    /// The Conversation should be re-armed under this new context id (the
    /// published Answer's event id).
    Rearmed(String),
    /// The Conversation is over; nothing more to arm.
    Ended,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Validate, verify payment for, answer, and (optionally) re-arm `conv` in
/// response to `question_event`. Every `Err` return means the Conversation
/// is abandoned with no Answer published; every `Ok` means an Answer was
/// published.
pub(crate) async fn process(
    ctx: &Arc<AgentContext>,
    conv: &mut ConversationState,
    question_event: Event,
) -> Result<TurnOutcome, TurnError> {
    if question_event.kind != kinds::QUESTION {
        return Err(TurnError::Validation(format!(
            "expected kind {}, got {}",
            kinds::QUESTION,
            question_event.kind
        )));
    }
    let tagged_context = question_event
        .tag_value("e")
        .ok_or_else(|| TurnError::Validation("question event missing e tag".to_string()))?;
    if tagged_context != conv.context_id {
        return Err(TurnError::Validation(format!(
            "question e tag {tagged_context} does not match current context id {}",
            conv.context_id
        )));
    }

    let plaintext = nip44::decrypt(
        &question_event.content,
        &ctx.expert_key.secret_key(),
        &conv.session_pubkey,
    )?;
    let payload: QuestionPayload = serde_json::from_str(&plaintext)
        .map_err(|e| TurnError::Validation(format!("malformed question payload: {e}")))?;
    let preimage_hex = payload
        .tags
        .iter()
        .find(|t| t.first().map(String::as_str) == Some("preimage"))
        .and_then(|t| t.get(1))
        .ok_or_else(|| TurnError::Validation("question payload missing preimage tag".to_string()))?;

    let hash_matches = preimage::preimage_matches(preimage_hex, &conv.payment_hash)
        .map_err(|e| TurnError::Validation(format!("malformed preimage or payment hash: {e}")))?;
    if !hash_matches {
        return Err(TurnError::PaymentHashMismatch);
    }

    // The preimage check alone proves knowledge, not settlement at this
    // wallet; the lookup alone wouldn't bind the payment to *this*
    // question. Both are required — neither is dropped.
    let status = ctx.payments.lookup_invoice(&conv.payment_hash).await?;
    if !status.is_paid() {
        return Err(TurnError::PaymentUnsettled);
    }

    let handler_question = Question {
        id: question_event.id.clone(),
        content: payload.content.clone(),
        tags: payload.tags.clone(),
    };
    let answer_draft = ctx
        .on_question
        .on_question(&conv.ask, &conv.bid_offer, &handler_question, &conv.history)
        .await
        .map_err(|e| TurnError::Handler(e.0))?;

    let followup_invoice = match answer_draft.followup_sats.filter(|sats| *sats > 0) {
        Some(sats) => Some(
            ctx.payments
                .make_invoice(sats * 1000, &format!("Follow-up for question {}", question_event.id))
                .await?,
        ),
        None => None,
    };

    let mut answer_tags = answer_draft.tags.clone();
    if let Some(ref invoice) = followup_invoice {
        answer_tags.push(tag("invoice", invoice.invoice.clone()));
    }
    let answer_payload = AnswerPayload {
        content: answer_draft.content.clone(),
        tags: answer_tags,
    };
    let payload_json =
        serde_json::to_string(&answer_payload).expect("AnswerPayload serializes cleanly");

    let answer_key = Keypair::generate();
    let ciphertext = nip44::encrypt(&payload_json, &ctx.expert_key.secret_key(), &conv.session_pubkey)?;

    let unsigned_answer = UnsignedEvent {
        pubkey: answer_key.public_key_hex(),
        created_at: now(),
        kind: kinds::ANSWER,
        tags: vec![tag("e", question_event.id.clone())],
        content: ciphertext,
    };
    let answer_event = codec::build_and_sign(unsigned_answer, &answer_key)?;
    // `answer_key` is discarded here, same as the bid's ephemeral key.

    let outcome = ctx.relay.publish(&ctx.config.question_relays, answer_event.clone()).await;
    if !outcome.any_accepted() {
        warn!(question_id = %question_event.id, "answer accepted by zero relays");
        return Err(TurnError::Publish);
    }

    info!(question_id = %question_event.id, answer_id = %answer_event.id, "answer published");
    conv.history.push(HistoryTurn {
        question: handler_question,
        answer: answer_draft,
    });

    match followup_invoice {
        Some(invoice) => {
            conv.payment_hash = invoice.payment_hash;
            info!(
                old_context_id = %conv.context_id,
                new_context_id = %answer_event.id,
                "conversation re-armed for follow-up"
            );
            Ok(TurnOutcome::Rearmed(answer_event.id))
        }
        None => {
            info!(context_id = %conv.context_id, "conversation completed with no follow-up offered");
            Ok(TurnOutcome::Ended)
        }
    }
}
