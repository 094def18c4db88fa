//! The Ask Listener: two concurrent subscriptions on the configured ask
//! relays, both since `now - 10s`, both filtering on
//! kind = Ask — a topic subscription (only when `hashtags` is non-empty)
//! and a direct-address subscription (`#p = [expert pubkey]`, always open).
//! Cross-subscription dedup is the Multiplexer's job, not ours.

use std::sync::Arc;

use expert_core::kinds;
use expert_relay::filter::Filter;
use expert_relay::{RelayError, Subscription};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::agent::AgentContext;
use crate::bid;

/// How far back `since` reaches, bounding backfill on subscribe.
const BACKFILL_WINDOW_SECS: i64 = 10;

/// Open both ask subscriptions and spawn one dispatch task per
/// subscription. Each dispatch task owns its subscription for the rest of
/// the process (or until shutdown); this function only waits for the
/// initial `subscribe` calls to succeed.
pub(crate) async fn start(ctx: Arc<AgentContext>) -> Result<Vec<JoinHandle<()>>, RelayError> {
    let since = now() - BACKFILL_WINDOW_SECS;
    let mut handles = Vec::new();

    if !ctx.config.hashtags.is_empty() {
        let filter = Filter::new()
            .kind(kinds::ASK)
            .since(since)
            .tag('t', ctx.config.hashtags.clone());
        let sub = ctx.relay.subscribe(&ctx.config.ask_relays, vec![filter]).await?;
        debug!(hashtags = ?ctx.config.hashtags, "topic ask subscription opened");
        handles.push(spawn_dispatch(ctx.clone(), sub, "topic"));
    }

    let direct_filter = Filter::new()
        .kind(kinds::ASK)
        .since(since)
        .tag('p', vec![ctx.expert_key.public_key_hex()]);
    let direct_sub = ctx.relay.subscribe(&ctx.config.ask_relays, vec![direct_filter]).await?;
    debug!("direct-address ask subscription opened");
    handles.push(spawn_dispatch(ctx, direct_sub, "direct-address"));

    Ok(handles)
}

/// Drain one ask subscription, dispatching every delivered event to the Bid
/// Pipeline on its own task — one slow `on_ask` handler must not delay the
/// next ask's bid — a slow handler delays only the Conversations whose
/// turn it is processing.
fn spawn_dispatch(ctx: Arc<AgentContext>, mut sub: Subscription, label: &'static str) -> JoinHandle<()> {
    let mut shutdown = ctx.shutdown.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                maybe_event = sub.events.recv() => {
                    match maybe_event {
                        Some(event) => {
                            if event.kind != kinds::ASK {
                                warn!(kind = event.kind, subscription = label, "ignoring non-Ask event on ask subscription");
                                continue;
                            }
                            debug!(ask_id = %event.id, subscription = label, "dispatching ask to bid pipeline");
                            let dispatch_ctx = ctx.clone();
                            tokio::spawn(async move { bid::handle_ask(dispatch_ctx, event).await });
                        }
                        None => break,
                    }
                }
            }
        }
        sub.close();
        debug!(subscription = label, "ask subscription dispatch task exiting");
    })
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
