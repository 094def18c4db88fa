//! An in-memory `RelayMultiplexer` test double. `subscribe` records the
//! filter and hands back a channel the test can push synthetic events into
//! via [`MockRelayMultiplexer::deliver`]; `publish` records published events
//! and reports success for every relay except those marked with
//! [`MockRelayMultiplexer::fail_relay`]. This is the double the seed
//! end-to-end scenarios are written against.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use expert_core::event::Event;
use tokio::sync::{mpsc, oneshot};

use crate::error::RelayError;
use crate::filter::Filter;
use crate::multiplexer::{PublishOutcome, RelayMultiplexer, Subscription, SubscriptionCloser};

struct MockSubscription {
    relays: Vec<String>,
    filters: Vec<Filter>,
    sender: mpsc::UnboundedSender<Event>,
    delivered_ids: HashSet<String>,
    closer: SubscriptionCloser,
}

#[derive(Default)]
struct MockState {
    subscriptions: Vec<MockSubscription>,
    published: Vec<(Vec<String>, Event)>,
    failing_relays: HashSet<String>,
}

#[derive(Default)]
pub struct MockRelayMultiplexer {
    state: Mutex<MockState>,
}

impl MockRelayMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `relay` so future `publish` calls report it as rejecting.
    pub fn fail_relay(&self, relay: &str) {
        self.state.lock().unwrap().failing_relays.insert(relay.to_string());
    }

    /// Simulate `relay` delivering `event` to every live subscription whose
    /// relay list includes it and whose filter matches, deduplicating by
    /// event id the way a real multiplexer would across relays.
    pub fn deliver(&self, relay: &str, event: Event) {
        let mut state = self.state.lock().unwrap();
        state.subscriptions.retain(|sub| !sub.closer.is_closed());
        for sub in state.subscriptions.iter_mut() {
            if sub.closer.is_closed() {
                continue;
            }
            if !sub.relays.iter().any(|r| r == relay) {
                continue;
            }
            if !sub.filters.iter().any(|f| f.matches(&event)) {
                continue;
            }
            if !sub.delivered_ids.insert(event.id.clone()) {
                continue;
            }
            let _ = sub.sender.send(event.clone());
        }
    }

    /// Every event published so far, in call order.
    pub fn published_events(&self) -> Vec<Event> {
        self.state
            .lock()
            .unwrap()
            .published
            .iter()
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Number of currently-open (not-yet-closed) subscriptions.
    pub fn open_subscription_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.subscriptions.iter().filter(|s| !s.closer.is_closed()).count()
    }
}

#[async_trait]
impl RelayMultiplexer for MockRelayMultiplexer {
    async fn subscribe(
        &self,
        relays: &[String],
        filters: Vec<Filter>,
    ) -> Result<Subscription, RelayError> {
        if relays.is_empty() {
            return Err(RelayError::NoRelays);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let (eose_tx, eose_rx) = oneshot::channel();
        let closer = SubscriptionCloser::new();

        self.state.lock().unwrap().subscriptions.push(MockSubscription {
            relays: relays.to_vec(),
            filters,
            sender: tx,
            delivered_ids: HashSet::new(),
            closer: closer.clone(),
        });

        // The mock never has backlog to replay, so historic events are
        // trivially drained the instant the subscription opens.
        let _ = eose_tx.send(());

        Ok(Subscription::new(rx, eose_rx, closer))
    }

    async fn publish(&self, relays: &[String], event: Event) -> PublishOutcome {
        if relays.is_empty() {
            return PublishOutcome::default();
        }
        let mut state = self.state.lock().unwrap();
        let mut outcome = PublishOutcome::default();
        for relay in relays {
            if state.failing_relays.contains(relay) {
                outcome
                    .rejected
                    .push((relay.clone(), "mock relay configured to reject".to_string()));
            } else {
                outcome.accepted.push(relay.clone());
            }
        }
        state.published.push((relays.to_vec(), event));
        outcome
    }

    async fn close_all(&self, relays: &[String]) {
        let mut state = self.state.lock().unwrap();
        for sub in state.subscriptions.iter() {
            if sub.relays.iter().any(|r| relays.contains(r)) {
                sub.closer.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expert_core::event::tag;

    fn event(id: &str, kind: u32, tags: Vec<Vec<String>>) -> Event {
        Event {
            id: id.to_string(),
            pubkey: "pk".to_string(),
            created_at: 1000,
            kind,
            tags,
            content: "x".to_string(),
            sig: "sig".to_string(),
        }
    }

    #[tokio::test]
    async fn subscribe_delivers_matching_events_and_fires_eose() {
        let mux = MockRelayMultiplexer::new();
        let relays = vec!["wss://a".to_string()];
        let mut sub = mux
            .subscribe(&relays, vec![Filter::new().kind(20174)])
            .await
            .unwrap();
        sub.eose.try_recv().unwrap();

        mux.deliver("wss://a", event("e1", 20174, vec![]));
        let received = sub.events.recv().await.unwrap();
        assert_eq!(received.id, "e1");
    }

    #[tokio::test]
    async fn non_matching_kind_is_not_delivered() {
        let mux = MockRelayMultiplexer::new();
        let relays = vec!["wss://a".to_string()];
        let mut sub = mux
            .subscribe(&relays, vec![Filter::new().kind(20174)])
            .await
            .unwrap();
        mux.deliver("wss://a", event("e1", 1, vec![]));
        assert!(sub.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn duplicate_delivery_across_relays_is_deduped() {
        let mux = MockRelayMultiplexer::new();
        let relays = vec!["wss://a".to_string(), "wss://b".to_string()];
        let mut sub = mux.subscribe(&relays, vec![Filter::new().kind(1)]).await.unwrap();
        mux.deliver("wss://a", event("dup", 1, vec![]));
        mux.deliver("wss://b", event("dup", 1, vec![]));
        assert!(sub.events.recv().await.is_some());
        assert!(sub.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_reports_failures_for_marked_relays() {
        let mux = MockRelayMultiplexer::new();
        mux.fail_relay("wss://bad");
        let relays = vec!["wss://good".to_string(), "wss://bad".to_string()];
        let outcome = mux.publish(&relays, event("e1", 1, vec![])).await;
        assert!(outcome.any_accepted());
        assert_eq!(outcome.accepted, vec!["wss://good".to_string()]);
        assert_eq!(outcome.rejected.len(), 1);
    }

    #[tokio::test]
    async fn closed_subscription_stops_receiving() {
        let mux = MockRelayMultiplexer::new();
        let relays = vec!["wss://a".to_string()];
        let sub = mux.subscribe(&relays, vec![Filter::new().kind(1)]).await.unwrap();
        sub.close();
        sub.close(); // idempotent
        mux.deliver("wss://a", event("e1", 1, vec![tag("t", "x")]));
        assert_eq!(mux.open_subscription_count(), 0);
    }
}
