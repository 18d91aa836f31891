//! Bridge service
//!
//! Sits between the host panel and the OSC transport: owns the connection
//! state machine, re-issues the registration handshake on every Ready
//! transition, resolves host intents through the command table, and feeds
//! inbound messages through the feedback table into the variable store.

pub mod commands;
pub mod feedback;

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use rosc::OscMessage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::state::{Variable, VariableStore};
use crate::transport::{
    ConnectionState, OscTransport, StatusCallback, TransportEvent,
};

pub use commands::{Command, FeedbackEndpoint};

/// Cap on command messages held back while the connection is not ready.
/// Oldest entries are dropped first once the cap is reached.
const PENDING_LIMIT: usize = 64;

/// Shared connection status cell with subscriber notification.
#[derive(Clone)]
struct StatusCell {
    state: Arc<RwLock<ConnectionState>>,
    callbacks: Arc<RwLock<Vec<StatusCallback>>>,
}

impl StatusCell {
    fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            callbacks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    fn get(&self) -> ConnectionState {
        self.state.read().clone()
    }

    fn set(&self, next: ConnectionState) {
        {
            let mut state = self.state.write();
            if *state == next {
                return;
            }
            *state = next.clone();
        }

        for callback in self.callbacks.read().iter() {
            callback(next.clone());
        }
    }

    fn subscribe(&self, callback: StatusCallback) {
        // emit current status immediately to the new subscriber
        callback(self.get());
        self.callbacks.write().push(callback);
    }
}

/// The bridge: one per configured Gabin instance.
pub struct GabinBridge {
    config: BridgeConfig,
    transport: Arc<RwLock<Option<Arc<OscTransport>>>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
    status: StatusCell,
    variables: VariableStore,
    pending: Arc<Mutex<VecDeque<OscMessage>>>,
}

impl GabinBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            transport: Arc::new(RwLock::new(None)),
            event_task: Mutex::new(None),
            status: StatusCell::new(),
            variables: VariableStore::new(),
            pending: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The variable store read by the host panel
    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    /// Current connection state
    pub fn status(&self) -> ConnectionState {
        self.status.get()
    }

    /// Subscribe to connection status changes.
    ///
    /// The current status is emitted immediately to the new subscriber.
    pub fn subscribe_status(&self, callback: StatusCallback) {
        self.status.subscribe(callback);
    }

    /// Address the feedback socket actually bound to, once connected
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.read().as_ref().map(|t| t.local_addr())
    }

    fn endpoint(&self) -> FeedbackEndpoint {
        FeedbackEndpoint {
            host: self.config.feedback_host.clone(),
            port: self.config.feedback_port,
        }
    }

    /// Open the transport and start the event loop.
    ///
    /// A no-op while a connect is already in flight. An existing connection
    /// is torn down and rebuilt. The handshake itself runs once the Ready
    /// event comes back through the event loop.
    pub async fn connect(&self) -> Result<()> {
        if self.status.get() == ConnectionState::Connecting {
            info!("Already connecting, ignoring connect request");
            return Ok(());
        }

        self.teardown();
        self.status.set(ConnectionState::Connecting);

        let local = self.config.feedback_addr()?;
        let remote = self.config.remote_addr()?;
        info!("Connecting to Gabin at {remote} (feedback on {local})");

        let (events_tx, events_rx) = mpsc::channel(256);
        let transport = match OscTransport::open(local, remote, events_tx).await {
            Ok(transport) => Arc::new(transport),
            Err(e) => {
                self.status.set(ConnectionState::Failed {
                    reason: e.to_string(),
                });
                return Err(e).context("failed to open OSC transport");
            },
        };

        *self.transport.write() = Some(Arc::clone(&transport));

        let ctx = EventLoopCtx {
            status: self.status.clone(),
            variables: self.variables.clone(),
            transport,
            endpoint: self.endpoint(),
            pending: Arc::clone(&self.pending),
        };
        *self.event_task.lock() = Some(tokio::spawn(run_event_loop(events_rx, ctx)));

        Ok(())
    }

    /// Resolve a host intent and send it.
    ///
    /// Commands issued while the connection is not ready are queued and
    /// flushed right after the registration handshake on the next Ready
    /// transition.
    pub async fn execute(&self, command: Command) -> Result<()> {
        let endpoint = self.endpoint();
        let mut msgs = command.messages(&endpoint);

        if matches!(command, Command::Start) {
            // starting re-subscribes and refreshes the ready flag in one go
            msgs.extend(Command::Register.messages(&endpoint));
            msgs.extend(Command::QueryReady.messages(&endpoint));

            // Gabin does not report this transition yet; assume it happened
            self.variables.set(Variable::Autocam, "true");
        }

        self.dispatch(msgs).await;
        Ok(())
    }

    async fn dispatch(&self, msgs: Vec<OscMessage>) {
        let transport = self.transport.read().clone();
        let ready = self.status.get() == ConnectionState::Ready;

        match transport {
            Some(transport) if ready => {
                for msg in msgs {
                    debug!("OSC -> {} {:?}", msg.addr, msg.args);
                    if let Err(e) = transport.send(msg).await {
                        warn!("OSC send failed: {e}");
                    }
                }
            },
            _ => {
                let mut pending = self.pending.lock();
                for msg in msgs {
                    while pending.len() >= PENDING_LIMIT {
                        let dropped = pending.pop_front();
                        warn!(
                            "pending queue full, dropping {}",
                            dropped.map(|m| m.addr).unwrap_or_default()
                        );
                    }
                    debug!("connection not ready, queueing {}", msg.addr);
                    pending.push_back(msg);
                }
            },
        }
    }

    fn teardown(&self) {
        if let Some(task) = self.event_task.lock().take() {
            task.abort();
        }
        if let Some(transport) = self.transport.write().take() {
            transport.close();
        }
    }

    /// Tear the connection down for good.
    pub fn shutdown(&self) {
        info!("Shutting down Gabin bridge");
        self.teardown();
        self.status.set(ConnectionState::Disconnected);
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Drop for GabinBridge {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Everything the event loop task needs, cloned out of the bridge.
struct EventLoopCtx {
    status: StatusCell,
    variables: VariableStore,
    transport: Arc<OscTransport>,
    endpoint: FeedbackEndpoint,
    pending: Arc<Mutex<VecDeque<OscMessage>>>,
}

/// Consume transport events and drive the state machine.
///
/// Runs until the transport closes or the bridge tears it down. The
/// handshake always completes before queued commands are flushed, so a
/// command issued before Ready can never overtake a registration.
async fn run_event_loop(mut events: mpsc::Receiver<TransportEvent>, ctx: EventLoopCtx) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Ready => {
                info!("Connected to Gabin at {}", ctx.transport.remote_addr());
                ctx.status.set(ConnectionState::Ready);

                for msg in Command::Register.messages(&ctx.endpoint) {
                    debug!("OSC -> {} {:?}", msg.addr, msg.args);
                    if let Err(e) = ctx.transport.send(msg).await {
                        warn!("registration send failed: {e}");
                    }
                }

                let queued: Vec<OscMessage> = ctx.pending.lock().drain(..).collect();
                if !queued.is_empty() {
                    info!("Flushing {} queued command message(s)", queued.len());
                }
                for msg in queued {
                    debug!("OSC -> {} {:?}", msg.addr, msg.args);
                    if let Err(e) = ctx.transport.send(msg).await {
                        warn!("queued send failed: {e}");
                    }
                }
            },

            TransportEvent::Message(msg) => {
                match feedback::variable_update(&msg) {
                    Some((var, value)) => {
                        debug!("Feedback {} -> {} = {value}", msg.addr, var.id());
                        ctx.variables.set(var, value);
                    },
                    None => {
                        debug!("ignoring OSC message on {}", msg.addr);
                    },
                }
            },

            TransportEvent::Error(err) => {
                warn!("Transport error: {err}");
                ctx.status.set(ConnectionState::Failed {
                    reason: err.to_string(),
                });
            },

            TransportEvent::Closed => {
                info!("Connection to Gabin closed");
                ctx.status.set(ConnectionState::Failed {
                    reason: "closed".to_string(),
                });
            },
        }
    }
}
