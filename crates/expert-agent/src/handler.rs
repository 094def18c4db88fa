//! User-supplied decision and answer-generation callbacks, `on_ask` and
//! `on_question`. These are the only place domain logic enters the core;
//! everything else in `expert-agent` is protocol mechanics.

use async_trait::async_trait;
use expert_core::{AnswerDraft, Ask, BidDecision, BidOffer, HistoryTurn, Question};

use crate::error::HandlerError;

/// Decides whether to bid on an ask, and for how much.
#[async_trait]
pub trait AskHandler: Send + Sync {
    async fn on_ask(&self, ask: &Ask) -> Result<BidDecision, HandlerError>;
}

/// Generates an answer for a paid, verified question.
#[async_trait]
pub trait QuestionHandler: Send + Sync {
    async fn on_question(
        &self,
        ask: &Ask,
        bid: &BidOffer,
        question: &Question,
        history: &[HistoryTurn],
    ) -> Result<AnswerDraft, HandlerError>;
}
