//! expert-demo — a minimal host binary wiring `expert-agent` up to real
//! relays and a real NWC wallet, with a canned `AskHandler`/`QuestionHandler`
//! pair standing in for actual domain logic. Follows the usual CLI startup
//! shape (parse args, init tracing, build the collaborators, run until
//! signalled) but for a library core rather than an inlined node.
//!
//! This binary is a demonstration of how to embed `ExpertAgent`, not part
//! of the core itself — a real deployment supplies its own handlers.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use tracing::info;

use expert_agent::{AskHandler, ExpertAgent, HandlerError, QuestionHandler};
use expert_core::handler::{Ask, AnswerDraft, BidDecision, BidOffer, HistoryTurn, Question};
use expert_core::ExpertConfig;
use expert_payments::nwc::NwcPaymentBackend;
use expert_relay::websocket::WebSocketMultiplexer;

#[derive(Parser, Debug)]
#[command(
    name = "expert-demo",
    version,
    about = "Demo Expert Agent: bids a fixed price on every matching ask, answers with a canned response"
)]
struct Args {
    /// Nostr Wallet Connect connection URI.
    #[arg(long, env = "EXPERT_NWC_STRING")]
    nwc_string: String,

    /// Hex-encoded 32-byte secret scalar for the expert's long-term keypair.
    #[arg(long, env = "EXPERT_PRIVKEY")]
    expert_privkey: String,

    /// Relay URLs to listen for asks on (comma-separated).
    #[arg(long, value_delimiter = ',')]
    ask_relays: Vec<String>,

    /// Relay URLs advertised in bid payloads (comma-separated).
    #[arg(long, value_delimiter = ',')]
    question_relays: Vec<String>,

    /// Topic tags to bid on (comma-separated); empty means direct-address only.
    #[arg(long, value_delimiter = ',', default_value = "")]
    hashtags: Vec<String>,

    /// Seconds before an armed bid expires unanswered.
    #[arg(long, default_value_t = ExpertConfig::DEFAULT_BID_TIMEOUT_SECS)]
    bid_timeout_secs: u64,

    /// Price, in satoshis, bid on every matching ask.
    #[arg(long, default_value_t = 21)]
    bid_sats: u64,
}

/// Bids `bid_sats` on every ask it sees — no filtering beyond what the Ask
/// Listener's subscriptions already applied.
struct FlatRateBidder {
    bid_sats: u64,
}

#[async_trait]
impl AskHandler for FlatRateBidder {
    async fn on_ask(&self, ask: &Ask) -> Result<BidDecision, HandlerError> {
        info!(ask_id = %ask.id, asker = %ask.pubkey, "bidding on ask");
        Ok(BidDecision::Offer(BidOffer {
            content: "Happy to help — ask away once paid.".to_string(),
            bid_sats: self.bid_sats,
            tags: vec![],
        }))
    }
}

/// Answers every paid question with a canned response and never offers a
/// follow-up. A real expert would replace this with a model call, a lookup,
/// or a human-in-the-loop queue.
struct CannedAnswerer;

#[async_trait]
impl QuestionHandler for CannedAnswerer {
    async fn on_question(
        &self,
        _ask: &Ask,
        _bid: &BidOffer,
        question: &Question,
        history: &[HistoryTurn],
    ) -> Result<AnswerDraft, HandlerError> {
        info!(question_id = %question.id, turn = history.len() + 1, "answering question");
        Ok(AnswerDraft {
            content: format!(
                "Thanks for your payment. You asked: \"{}\". Here is my answer.",
                question.content
            ),
            tags: vec![],
            followup_sats: None,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,expert=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("expert-demo starting");

    let config = ExpertConfig {
        nwc_string: args.nwc_string,
        expert_privkey: args.expert_privkey,
        ask_relays: args.ask_relays,
        question_relays: args.question_relays,
        hashtags: args.hashtags.into_iter().filter(|t| !t.is_empty()).collect(),
        bid_timeout_secs: args.bid_timeout_secs,
    };

    let relay = Arc::new(WebSocketMultiplexer::new());
    let payments = Arc::new(
        NwcPaymentBackend::new(&config.nwc_string, WebSocketMultiplexer::new())
            .context("parsing NWC connection string")?,
    );
    let on_ask = Arc::new(FlatRateBidder { bid_sats: args.bid_sats });
    let on_question = Arc::new(CannedAnswerer);

    let agent = ExpertAgent::new(config, relay, payments, on_ask, on_question)
        .context("constructing expert agent")?;

    info!(pubkey = %agent.public_key_hex(), "expert identity");
    agent.start().await.context("starting expert agent")?;
    info!("expert agent running — press ctrl-c to stop");

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown requested");
    agent.stop().await;
    info!("expert agent stopped");

    Ok(())
}
