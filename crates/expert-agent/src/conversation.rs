//! One Conversation's entire lifetime, across however many paid turns it
//! chains. Each armed Conversation is owned by exactly one Tokio task, from
//! its first arming (just after the Bid publishes) until the turn that ends
//! it — a timeout, a shutdown, or an answer that offers no follow-up. A
//! follow-up re-arms the *same* task under a new context id rather than
//! spawning a new one, so the task's own loop is where rekeying actually
//! happens.

use std::sync::Arc;
use std::time::Duration;

use expert_core::event::Event;
use expert_core::{kinds, Ask, BidOffer, HistoryTurn};
use expert_relay::filter::Filter;
use tokio::sync::watch;
use tracing::{debug, error, warn, Level};

use crate::agent::AgentContext;
use crate::registry::ConversationSnapshot;
use crate::turn::{self, TurnOutcome};

/// The state owned by a Conversation's task across its whole lifetime.
/// `context_id` and `payment_hash` are the two fields a turn mutates;
/// everything else is fixed at bid time or only ever appended to.
pub(crate) struct ConversationState {
    pub ask: Ask,
    pub ask_event: Event,
    pub bid_offer: BidOffer,
    /// The asker's pubkey from the original Ask. Immutable across
    /// follow-ups — every encryption in this Conversation is keyed against
    /// it.
    pub session_pubkey: String,
    pub payment_hash: String,
    pub created_at: i64,
    pub context_id: String,
    pub history: Vec<HistoryTurn>,
}

enum Resolution {
    Question(Event),
    Timeout,
    Shutdown,
}

/// Drive a Conversation from its initial arming to its end. Runs as its own
/// Tokio task (spawned by the Bid Pipeline), looping once per follow-up
/// turn.
pub(crate) async fn run(ctx: Arc<AgentContext>, mut conv: ConversationState, mut shutdown: watch::Receiver<bool>) {
    loop {
        let filter = Filter::new()
            .kind(kinds::QUESTION)
            .tag('e', vec![conv.context_id.clone()]);
        let mut sub = match ctx
            .relay
            .subscribe(&ctx.config.question_relays, vec![filter])
            .await
        {
            Ok(sub) => sub,
            Err(e) => {
                warn!(context_id = %conv.context_id, error = %e, "failed to arm question subscription; conversation abandoned");
                return;
            }
        };

        ctx.registry.insert(
            conv.context_id.clone(),
            ConversationSnapshot {
                ask_id: conv.ask_event.id.clone(),
                session_pubkey: conv.session_pubkey.clone(),
                payment_hash: conv.payment_hash.clone(),
                created_at: conv.created_at,
                history_len: conv.history.len(),
            },
        );
        debug!(context_id = %conv.context_id, "conversation armed");

        let sleep = tokio::time::sleep(Duration::from_secs(ctx.config.bid_timeout_secs));
        tokio::pin!(sleep);

        // Events delivered for this Conversation are processed in arrival
        // order; there is exactly one question subscription per
        // Conversation, so "arrival order" is just this channel's order.
        let resolution = tokio::select! {
            biased;
            _ = shutdown.changed() => Resolution::Shutdown,
            _ = &mut sleep => Resolution::Timeout,
            maybe_event = sub.events.recv() => match maybe_event {
                Some(event) => Resolution::Question(event),
                None => Resolution::Timeout,
            },
        };

        // Remove from the registry and close the subscription *before*
        // invoking the answer handler — a second question event racing in
        // during handler execution finds no registration and is dropped.
        // This is what gives single-shot-per-turn without any extra
        // locking.
        ctx.registry.remove(&conv.context_id);
        sub.close();

        let question_event = match resolution {
            Resolution::Question(event) => event,
            Resolution::Timeout => {
                debug!(context_id = %conv.context_id, "conversation timed out");
                return;
            }
            Resolution::Shutdown => {
                debug!(context_id = %conv.context_id, "conversation closed by shutdown");
                return;
            }
        };

        match turn::process(&ctx, &mut conv, question_event).await {
            Ok(TurnOutcome::Rearmed(new_context_id)) => {
                conv.context_id = new_context_id;
                continue;
            }
            Ok(TurnOutcome::Ended) => return,
            Err(e) => {
                match e.log_level() {
                    Level::DEBUG => debug!(context_id = %conv.context_id, error = %e, "turn abandoned"),
                    Level::ERROR => error!(context_id = %conv.context_id, error = %e, "turn abandoned"),
                    _ => warn!(context_id = %conv.context_id, error = %e, "turn abandoned"),
                }
                return;
            }
        }
    }
}
