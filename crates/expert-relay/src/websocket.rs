//! `WebSocketMultiplexer`: the production `RelayMultiplexer`. One
//! `tokio-tungstenite` connection task per relay URL, fanning REQ/EVENT/
//! CLOSE frames out and dispatching EVENT/EOSE/OK frames back in, with
//! event-id dedup across relays for a single logical subscription.
//!
//! No reconnect/backoff policy. A dropped connection stays dropped for the
//! remainder of the process; a reconnect layer is flagged as a future
//! improvement in DESIGN.md rather than built here.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use expert_core::event::Event;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::RelayError;
use crate::filter::Filter;
use crate::multiplexer::{PublishOutcome, RelayMultiplexer, Subscription, SubscriptionCloser};

/// How long `publish` waits for a relay's `OK` acknowledgement before
/// treating that relay as a non-response (counted as rejected).
const PUBLISH_ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// How many recently-seen event ids a single subscription remembers for
/// cross-relay dedup before evicting the oldest.
const DEDUP_CAP: usize = 4096;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

struct Dispatch {
    /// sub_id -> raw per-relay forward channel, pre-dedup.
    subs: HashMap<String, mpsc::UnboundedSender<Event>>,
    /// sub_id -> waiters for this relay's EOSE.
    eose_waiters: HashMap<String, Vec<oneshot::Sender<()>>>,
    /// event id -> ack channel, for in-flight publishes on this connection.
    acks: HashMap<String, oneshot::Sender<Result<(), String>>>,
}

struct Connection {
    write: AsyncMutex<WsSink>,
    dispatch: Arc<StdMutex<Dispatch>>,
    _reader: tokio::task::JoinHandle<()>,
}

/// `RelayMultiplexer` over real WebSocket connections to relay servers.
pub struct WebSocketMultiplexer {
    connections: AsyncMutex<HashMap<String, Arc<Connection>>>,
    next_sub_id: AtomicU64,
}

impl Default for WebSocketMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocketMultiplexer {
    pub fn new() -> Self {
        Self {
            connections: AsyncMutex::new(HashMap::new()),
            next_sub_id: AtomicU64::new(0),
        }
    }

    async fn ensure_connected(&self, relay: &str) -> Result<Arc<Connection>, RelayError> {
        let mut conns = self.connections.lock().await;
        if let Some(conn) = conns.get(relay) {
            return Ok(conn.clone());
        }
        let (stream, _) = tokio_tungstenite::connect_async(relay)
            .await
            .map_err(|e| RelayError::ConnectFailed(relay.to_string(), e.to_string()))?;
        let (write, mut read) = stream.split();
        let dispatch = Arc::new(StdMutex::new(Dispatch {
            subs: HashMap::new(),
            eose_waiters: HashMap::new(),
            acks: HashMap::new(),
        }));

        let reader_dispatch = dispatch.clone();
        let reader_relay = relay.to_string();
        let reader = tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        handle_inbound(&reader_relay, &text, &reader_dispatch);
                    }
                    Ok(Message::Close(_)) => {
                        debug!(relay = %reader_relay, "relay closed connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(relay = %reader_relay, error = %e, "relay read error");
                        break;
                    }
                }
            }
        });

        let conn = Arc::new(Connection {
            write: AsyncMutex::new(write),
            dispatch,
            _reader: reader,
        });
        conns.insert(relay.to_string(), conn.clone());
        Ok(conn)
    }

    fn next_sub_id(&self) -> String {
        format!("expert-{}", self.next_sub_id.fetch_add(1, Ordering::SeqCst))
    }
}

fn handle_inbound(relay: &str, text: &str, dispatch: &Arc<StdMutex<Dispatch>>) {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            debug!(relay, error = %e, "malformed relay frame");
            return;
        }
    };
    let Some(frame) = value.as_array() else {
        return;
    };
    let Some(tag) = frame.first().and_then(|v| v.as_str()) else {
        return;
    };
    match tag {
        "EVENT" => {
            let (Some(sub_id), Some(event_json)) = (frame.get(1).and_then(|v| v.as_str()), frame.get(2))
            else {
                return;
            };
            let event: Event = match serde_json::from_value(event_json.clone()) {
                Ok(e) => e,
                Err(e) => {
                    debug!(relay, error = %e, "malformed EVENT payload");
                    return;
                }
            };
            let d = dispatch.lock().unwrap();
            if let Some(tx) = d.subs.get(sub_id) {
                let _ = tx.send(event);
            }
        }
        "EOSE" => {
            let Some(sub_id) = frame.get(1).and_then(|v| v.as_str()) else {
                return;
            };
            let mut d = dispatch.lock().unwrap();
            if let Some(waiters) = d.eose_waiters.remove(sub_id) {
                for w in waiters {
                    let _ = w.send(());
                }
            }
        }
        "OK" => {
            let (Some(event_id), ok) = (
                frame.get(1).and_then(|v| v.as_str()),
                frame.get(2).and_then(|v| v.as_bool()).unwrap_or(false),
            ) else {
                return;
            };
            let msg = frame.get(3).and_then(|v| v.as_str()).unwrap_or("").to_string();
            let mut d = dispatch.lock().unwrap();
            if let Some(tx) = d.acks.remove(event_id) {
                let _ = tx.send(if ok { Ok(()) } else { Err(msg) });
            }
        }
        "NOTICE" => {
            if let Some(msg) = frame.get(1).and_then(|v| v.as_str()) {
                debug!(relay, %msg, "relay notice");
            }
        }
        "CLOSED" => {
            let Some(sub_id) = frame.get(1).and_then(|v| v.as_str()) else {
                return;
            };
            let mut d = dispatch.lock().unwrap();
            d.subs.remove(sub_id);
        }
        _ => {}
    }
}

async fn send_frame(sink: &AsyncMutex<WsSink>, frame: serde_json::Value) -> Result<(), RelayError> {
    let text = serde_json::to_string(&frame).expect("frame is valid JSON");
    let mut sink = sink.lock().await;
    sink.send(Message::Text(text))
        .await
        .map_err(|e| RelayError::ConnectionClosed(e.to_string()))
}

#[async_trait]
impl RelayMultiplexer for WebSocketMultiplexer {
    async fn subscribe(
        &self,
        relays: &[String],
        filters: Vec<Filter>,
    ) -> Result<Subscription, RelayError> {
        if relays.is_empty() {
            return Err(RelayError::NoRelays);
        }
        let sub_id = self.next_sub_id();
        let (out_tx, out_rx) = mpsc::unbounded_channel::<Event>();
        let (eose_tx, eose_rx) = oneshot::channel();
        let closer = SubscriptionCloser::new();

        let filter_json: Vec<serde_json::Value> = filters.iter().map(Filter::to_json).collect();
        let req = {
            let mut arr = vec![
                serde_json::Value::String("REQ".to_string()),
                serde_json::Value::String(sub_id.clone()),
            ];
            arr.extend(filter_json);
            serde_json::Value::Array(arr)
        };

        let mut raw_streams = Vec::with_capacity(relays.len());
        let mut connections = Vec::with_capacity(relays.len());
        for relay in relays {
            let conn = self.ensure_connected(relay).await?;
            let (raw_tx, raw_rx) = mpsc::unbounded_channel::<Event>();
            let (relay_eose_tx, relay_eose_rx) = oneshot::channel();
            {
                let mut d = conn.dispatch.lock().unwrap();
                d.subs.insert(sub_id.clone(), raw_tx);
                d.eose_waiters.entry(sub_id.clone()).or_default().push(relay_eose_tx);
            }
            send_frame(&conn.write, req.clone()).await?;
            raw_streams.push(tokio_stream::wrappers::UnboundedReceiverStream::new(raw_rx));
            connections.push((conn, relay_eose_rx));
        }

        // Fire the subscription's EOSE the moment any single relay signals
        // it has drained its backlog.
        tokio::spawn(async move {
            let waiters: Vec<_> = connections.into_iter().map(|(_, rx)| rx).collect();
            let _ = futures::future::select_all(waiters).await;
            let _ = eose_tx.send(());
        });

        let merged = futures::stream::select_all(raw_streams);
        let sub_id_for_task = sub_id.clone();
        let task_closer = closer.clone();
        tokio::spawn(async move {
            let mut seen: HashSet<String> = HashSet::new();
            let mut order: VecDeque<String> = VecDeque::new();
            let mut merged = std::pin::pin!(merged);
            loop {
                tokio::select! {
                    _ = task_closer.closed() => break,
                    maybe_event = merged.next() => {
                        match maybe_event {
                            Some(event) => {
                                if !seen.insert(event.id.clone()) {
                                    continue;
                                }
                                order.push_back(event.id.clone());
                                if order.len() > DEDUP_CAP {
                                    if let Some(oldest) = order.pop_front() {
                                        seen.remove(&oldest);
                                    }
                                }
                                if out_tx.send(event).is_err() {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
            debug!(sub_id = %sub_id_for_task, "subscription fan-in task exiting");
        });

        Ok(Subscription::new(out_rx, eose_rx, closer))
    }

    async fn publish(&self, relays: &[String], event: Event) -> PublishOutcome {
        let mut outcome = PublishOutcome::default();
        if relays.is_empty() {
            return outcome;
        }
        let event_json = serde_json::to_value(&event).expect("Event serializes cleanly");
        let frame = serde_json::json!(["EVENT", event_json]);

        let mut futs = Vec::with_capacity(relays.len());
        for relay in relays {
            let relay = relay.clone();
            let frame = frame.clone();
            let event_id = event.id.clone();
            futs.push(async move {
                let conn = match self.ensure_connected(&relay).await {
                    Ok(c) => c,
                    Err(e) => return (relay, Err(e.to_string())),
                };
                let (ack_tx, ack_rx) = oneshot::channel();
                {
                    let mut d = conn.dispatch.lock().unwrap();
                    d.acks.insert(event_id.clone(), ack_tx);
                }
                if let Err(e) = send_frame(&conn.write, frame).await {
                    return (relay, Err(e.to_string()));
                }
                match tokio::time::timeout(PUBLISH_ACK_TIMEOUT, ack_rx).await {
                    Ok(Ok(Ok(()))) => (relay, Ok(())),
                    Ok(Ok(Err(msg))) => (relay, Err(msg)),
                    Ok(Err(_)) => (relay, Err("ack channel dropped".to_string())),
                    Err(_) => (relay, Err("timed out waiting for OK".to_string())),
                }
            });
        }

        for (relay, result) in futures::future::join_all(futs).await {
            match result {
                Ok(()) => outcome.accepted.push(relay),
                Err(e) => outcome.rejected.push((relay, e)),
            }
        }
        outcome
    }

    async fn close_all(&self, relays: &[String]) {
        let mut conns = self.connections.lock().await;
        for relay in relays {
            if let Some(conn) = conns.remove(relay) {
                let mut sink = conn.write.lock().await;
                let _ = sink.close().await;
            }
        }
    }
}
