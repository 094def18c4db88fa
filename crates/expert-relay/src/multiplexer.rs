use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use expert_core::event::Event;
use tokio::sync::{mpsc, oneshot};

use crate::error::RelayError;
use crate::filter::Filter;

/// One logical pub/sub over a set of relay URLs.
///
/// `subscribe` deduplicates matching events by id across relays before
/// delivering them on the returned channel — a caller never sees the same
/// event twice even when two relays both have it. `publish` fans an event
/// out to every relay and is considered accepted once at least one relay
/// acknowledges it.
#[async_trait]
pub trait RelayMultiplexer: Send + Sync {
    /// Open a subscription on `relays` with `filters` (OR'd together, as
    /// NIP-01 REQ frames allow multiple filter objects per subscription).
    async fn subscribe(
        &self,
        relays: &[String],
        filters: Vec<Filter>,
    ) -> Result<Subscription, RelayError>;

    /// Publish `event` to every relay in `relays`, concurrently, returning
    /// the aggregated per-relay outcome.
    async fn publish(&self, relays: &[String], event: Event) -> PublishOutcome;

    /// Release all connections held open for the listed relays.
    async fn close_all(&self, relays: &[String]);
}

/// A live subscription: a channel of deduplicated inbound events, an
/// end-of-stored-events signal, and an idempotent close handle.
pub struct Subscription {
    pub events: mpsc::UnboundedReceiver<Event>,
    pub eose: oneshot::Receiver<()>,
    closer: SubscriptionCloser,
}

impl Subscription {
    pub fn new(
        events: mpsc::UnboundedReceiver<Event>,
        eose: oneshot::Receiver<()>,
        closer: SubscriptionCloser,
    ) -> Self {
        Self { events, eose, closer }
    }

    /// Close the subscription. Idempotent — calling it twice is a no-op the
    /// second time.
    pub fn close(&self) {
        self.closer.close();
    }
}

/// Shared, cloneable close signal for a subscription. Held by the
/// `Subscription` the caller owns and by the relay-connection task(s)
/// feeding it, so either side can trigger teardown.
#[derive(Clone)]
pub struct SubscriptionCloser {
    closed: Arc<AtomicBool>,
    signal: Arc<tokio::sync::Notify>,
}

impl SubscriptionCloser {
    pub fn new() -> Self {
        Self {
            closed: Arc::new(AtomicBool::new(false)),
            signal: Arc::new(tokio::sync::Notify::new()),
        }
    }

    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.signal.notify_waiters();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn closed(&self) {
        if self.is_closed() {
            return;
        }
        self.signal.notified().await;
    }
}

impl Default for SubscriptionCloser {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregated result of publishing one event to a set of relays.
#[derive(Debug, Clone, Default)]
pub struct PublishOutcome {
    pub accepted: Vec<String>,
    pub rejected: Vec<(String, String)>,
}

impl PublishOutcome {
    /// A publication with at least one success is considered accepted.
    pub fn any_accepted(&self) -> bool {
        !self.accepted.is_empty()
    }
}
