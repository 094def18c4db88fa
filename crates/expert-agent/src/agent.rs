//! Lifecycle: `ExpertAgent::start`/`stop` and the shared context every
//! pipeline stage runs against.
//!
//! Follows the usual long-running-service startup shape (open transports,
//! spawn the tasks that drive them, run until signalled to stop) but
//! packaged as a library type rather than inlined in a binary, since here
//! the host binary is a separate, optional crate (`demos/expert-demo`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use expert_core::{ConfigError, ExpertConfig};
use expert_crypto::Keypair;
use expert_payments::PaymentBackend;
use expert_relay::{RelayError, RelayMultiplexer};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::ask_listener;
use crate::handler::{AskHandler, QuestionHandler};
use crate::registry::Registry;

/// Shared, cheaply-cloneable state every spawned task (ask dispatch,
/// conversation) needs a handle to. Never held across a `.await` as a
/// whole — each field is independently locked or already `Send + Sync`.
pub(crate) struct AgentContext {
    pub config: ExpertConfig,
    pub expert_key: Arc<Keypair>,
    pub relay: Arc<dyn RelayMultiplexer>,
    pub payments: Arc<dyn PaymentBackend>,
    pub on_ask: Arc<dyn AskHandler>,
    pub on_question: Arc<dyn QuestionHandler>,
    pub registry: Arc<Registry>,
    pub shutdown: watch::Receiver<bool>,
    /// Every live conversation task's join handle, so `stop()` can drain
    /// them. Pushed to by the Bid Pipeline immediately after spawning a
    /// conversation task; never otherwise touched except by `stop()`.
    pub conversation_tasks: StdMutex<Vec<JoinHandle<()>>>,
}

/// The Expert Agent: the protocol's state machine. Owns no network
/// connections of its own (everything flows through the injected
/// [`RelayMultiplexer`]/[`PaymentBackend`]) and makes no domain decisions of
/// its own (that lives entirely in the injected [`AskHandler`]/
/// [`QuestionHandler`]).
pub struct ExpertAgent {
    ctx: Arc<AgentContext>,
    shutdown_tx: watch::Sender<bool>,
    ask_tasks: StdMutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl ExpertAgent {
    /// Construct an agent from configuration and its external
    /// collaborators. Fails synchronously only on malformed configuration —
    /// construction is the only place the public API returns an `Err`
    /// rather than logging and dropping.
    pub fn new(
        config: ExpertConfig,
        relay: Arc<dyn RelayMultiplexer>,
        payments: Arc<dyn PaymentBackend>,
        on_ask: Arc<dyn AskHandler>,
        on_question: Arc<dyn QuestionHandler>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let expert_key = Arc::new(
            Keypair::from_hex(&config.expert_privkey)
                .map_err(|e| ConfigError::InvalidPrivateKey(e.to_string()))?,
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = Arc::new(AgentContext {
            config,
            expert_key,
            relay,
            payments,
            on_ask,
            on_question,
            registry: Arc::new(Registry::new()),
            shutdown: shutdown_rx,
            conversation_tasks: StdMutex::new(Vec::new()),
        });
        Ok(Self {
            ctx,
            shutdown_tx,
            ask_tasks: StdMutex::new(Vec::new()),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    /// The expert's long-term public key, hex-encoded.
    pub fn public_key_hex(&self) -> String {
        self.ctx.expert_key.public_key_hex()
    }

    /// Number of conversations currently armed. Not part of the protocol —
    /// exposed for tests and operational introspection.
    pub fn live_conversation_count(&self) -> usize {
        self.ctx.registry.len()
    }

    /// Open the two ask subscriptions. Calling this more than once is a
    /// no-op past the first call, to avoid leaking subscriptions.
    pub async fn start(&self) -> Result<(), RelayError> {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("ExpertAgent::start called more than once; ignoring");
            return Ok(());
        }
        info!(pubkey = %self.public_key_hex(), "expert agent starting");
        let handles = ask_listener::start(self.ctx.clone()).await?;
        *self.ask_tasks.lock().unwrap() = handles;
        info!("expert agent ready");
        Ok(())
    }

    /// Close every ask subscription, every live question subscription,
    /// cancel every timer, clear the registry, and release relay
    /// connections for both relay sets. Idempotent.
    ///
    /// In-flight handler calls are not cancelled; their results are simply
    /// ignored once their owning conversation task returns, because the
    /// registry entry is already gone.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("expert agent stopping");
        let _ = self.shutdown_tx.send(true);

        let ask_handles = std::mem::take(&mut *self.ask_tasks.lock().unwrap());
        for handle in ask_handles {
            let _ = handle.await;
        }

        let conversation_handles = std::mem::take(&mut *self.ctx.conversation_tasks.lock().unwrap());
        for handle in conversation_handles {
            let _ = handle.await;
        }

        self.ctx.registry.clear();
        self.ctx.relay.close_all(&self.ctx.config.ask_relays).await;
        self.ctx.relay.close_all(&self.ctx.config.question_relays).await;
        info!("expert agent stopped");
    }
}
