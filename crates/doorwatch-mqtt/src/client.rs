//! Connection state machine with fixed-interval auto-reconnect.
//!
//! One background task owns the broker session and drives every transition:
//! connect, subscribe, read, disconnect, retry. Consumers observe it through
//! a [`watch`] channel (current [`ConnectionState`]), a [`broadcast`] channel
//! of [`LifecycleEvent`]s, and a [`broadcast`] channel of raw messages.
//!
//! Backoff is deliberately a fixed interval rather than exponential: broker
//! outages in this deployment are short, and operators expect predictable,
//! frequent retry. `max_attempts` lets a deployment opt into giving up.
//!
//! # Example
//!
//! ```rust,ignore
//! use doorwatch_mqtt::{MqttClient, ReconnectPolicy, TcpTransport};
//!
//! let client = MqttClient::new(TcpTransport::new("doorwatch"), ReconnectPolicy::default());
//! client.subscribe("door-events");
//! client.start("localhost", 1883);
//!
//! let mut messages = client.messages();
//! while let Ok(msg) = messages.recv().await {
//!     println!("{}: {} bytes", msg.topic, msg.payload.len());
//! }
//!
//! client.stop();
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::transport::{RawMessage, Session, Transport};

const LIFECYCLE_CHANNEL_CAPACITY: usize = 64;
const MESSAGE_CHANNEL_CAPACITY: usize = 1024;

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

// ── LifecycleEvent ───────────────────────────────────────────────────

/// Discrete lifecycle signals, for logging and orchestration.
///
/// `Error` fires exactly once, and only when the reconnect budget is
/// exhausted; per-attempt connect failures are logged, not signalled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Connected,
    Disconnected,
    Reconnecting { attempt: u32 },
    Error { message: String },
}

// ── ReconnectPolicy ──────────────────────────────────────────────────

/// Fixed-interval reconnection policy. Immutable after construction.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay between consecutive attempts. Default: 5 s.
    pub interval: Duration,

    /// Attempt budget after an unexpected disconnect. `0` = retry forever.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 0,
        }
    }
}

// ── MqttClient ───────────────────────────────────────────────────────

/// Handle to the broker connection. Cheaply cloneable.
pub struct MqttClient<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for MqttClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T> {
    transport: T,
    policy: ReconnectPolicy,
    state_tx: watch::Sender<ConnectionState>,
    lifecycle_tx: broadcast::Sender<LifecycleEvent>,
    message_tx: broadcast::Sender<Arc<RawMessage>>,
    /// Sticky topic: remembered across reconnects, re-issued after every
    /// successful connect. Without this, a broker restart would leave the
    /// client connected but deaf.
    sticky_topic: watch::Sender<Option<String>>,
    /// Cancellation token for the currently running connection loop.
    run: Mutex<Option<CancellationToken>>,
}

impl<T: Transport> MqttClient<T> {
    pub fn new(transport: T, policy: ReconnectPolicy) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (lifecycle_tx, _) = broadcast::channel(LIFECYCLE_CHANNEL_CAPACITY);
        let (message_tx, _) = broadcast::channel(MESSAGE_CHANNEL_CAPACITY);
        let (sticky_topic, _) = watch::channel(None);

        Self {
            inner: Arc::new(Inner {
                transport,
                policy,
                state_tx,
                lifecycle_tx,
                message_tx,
                sticky_topic,
                run: Mutex::new(None),
            }),
        }
    }

    /// Start the connection loop. Valid only while `Disconnected`;
    /// calling on a running client is a warning-logged no-op.
    pub fn start(&self, host: &str, port: u16) {
        let mut run = lock(&self.inner.run);
        if run.is_some() {
            tracing::warn!("MQTT client already running, ignoring start()");
            return;
        }

        let cancel = CancellationToken::new();
        *run = Some(cancel.clone());
        drop(run);

        self.inner
            .state_tx
            .send_replace(ConnectionState::Connecting);
        tracing::info!(host, port, "connecting to MQTT broker");

        let inner = Arc::clone(&self.inner);
        let host = host.to_owned();
        tokio::spawn(async move {
            run_loop(&inner, &host, port, &cancel).await;
            // The loop settles the state before exiting; the slot is
            // cleared here so start() works again after a fatal stop.
            lock(&inner.run).take();
        });
    }

    /// Manual disconnect: cancel any pending reconnect, close the session
    /// gracefully, settle in `Disconnected`. No further auto-transitions.
    pub fn stop(&self) {
        if let Some(cancel) = lock(&self.inner.run).take() {
            tracing::info!("disconnecting from MQTT broker");
            cancel.cancel();
        }
    }

    /// Subscribe to `topic` (QoS 0).
    ///
    /// The topic is sticky: issued immediately if connected, and re-issued
    /// automatically after every subsequent (re)connect.
    pub fn subscribe(&self, topic: impl Into<String>) {
        self.inner.sticky_topic.send_replace(Some(topic.into()));
    }

    pub fn is_connected(&self) -> bool {
        *self.inner.state_tx.borrow() == ConnectionState::Connected
    }

    /// Observe connection state transitions.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Subscribe to lifecycle signals.
    pub fn lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.inner.lifecycle_tx.subscribe()
    }

    /// Subscribe to the inbound message stream.
    pub fn messages(&self) -> broadcast::Receiver<Arc<RawMessage>> {
        self.inner.message_tx.subscribe()
    }
}

fn lock<V>(mutex: &Mutex<V>) -> std::sync::MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Connection loop ──────────────────────────────────────────────────

/// Main loop: connect → subscribe → read; on session end, fixed-interval
/// retry until the budget runs out or `stop()` cancels.
///
/// Single-writer by construction: every transition happens on this task,
/// so there is no "reconnect timer fired but we are already connected"
/// race to re-check for.
async fn run_loop<T: Transport>(
    inner: &Inner<T>,
    host: &str,
    port: u16,
    cancel: &CancellationToken,
) {
    let mut attempt: u32 = 0;
    let mut sticky = inner.sticky_topic.subscribe();

    loop {
        let connected = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = inner.transport.connect(host, port) => result,
        };

        match connected {
            Ok(mut session) => {
                attempt = 0;
                inner.state_tx.send_replace(ConnectionState::Connected);
                let _ = inner.lifecycle_tx.send(LifecycleEvent::Connected);
                tracing::info!(host, port, "MQTT broker connected");

                let ended = run_session(inner, &mut session, &mut sticky, cancel).await;

                let _ = inner.lifecycle_tx.send(LifecycleEvent::Disconnected);
                if cancel.is_cancelled() {
                    session.close().await;
                    break;
                }
                match ended {
                    Ok(()) => tracing::warn!("MQTT session closed by broker"),
                    Err(e) => tracing::warn!(error = %e, "MQTT session dropped"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "MQTT connect attempt failed");
                let _ = inner.lifecycle_tx.send(LifecycleEvent::Disconnected);
            }
        }

        // Reconnect decision. Attempts only accumulate while retrying;
        // a successful connect reset the counter above.
        if inner.policy.max_attempts == 0 || attempt < inner.policy.max_attempts {
            attempt += 1;
            inner
                .state_tx
                .send_replace(ConnectionState::Reconnecting { attempt });
            let _ = inner
                .lifecycle_tx
                .send(LifecycleEvent::Reconnecting { attempt });
            tracing::info!(
                attempt,
                delay_ms = inner.policy.interval.as_millis() as u64,
                "waiting before reconnect"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(inner.policy.interval) => {}
            }
        } else {
            let message = format!(
                "giving up after {} reconnect attempts",
                inner.policy.max_attempts
            );
            tracing::error!(max_attempts = inner.policy.max_attempts, "{message}");
            inner
                .state_tx
                .send_replace(ConnectionState::Disconnected);
            let _ = inner.lifecycle_tx.send(LifecycleEvent::Error { message });
            return;
        }
    }

    // Manual stop path.
    inner
        .state_tx
        .send_replace(ConnectionState::Disconnected);
    tracing::debug!("MQTT connection loop exited");
}

/// Drive one established session: issue the sticky subscription, then fan
/// out inbound messages until the session ends or the client stops.
async fn run_session<T: Transport>(
    inner: &Inner<T>,
    session: &mut T::Session,
    sticky: &mut watch::Receiver<Option<String>>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    // Re-issue unconditionally on every connect, even if the broker
    // preserves subscriptions. We connect clean-session anyway.
    let topic = sticky.borrow_and_update().clone();
    if let Some(ref topic) = topic {
        session.subscribe(topic).await?;
        tracing::info!(topic, "subscribed");
    }

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            changed = sticky.changed() => {
                if changed.is_err() {
                    continue; // sender lives in Inner; cannot drop while we run
                }
                let topic = sticky.borrow_and_update().clone();
                if let Some(ref topic) = topic {
                    session.subscribe(topic).await?;
                    tracing::info!(topic, "subscribed");
                }
            }
            message = session.next_message() => {
                let message = message?;
                tracing::debug!(
                    topic = %message.topic,
                    len = message.payload.len(),
                    "message received"
                );
                // A send error only means no subscribers right now.
                let _ = inner.message_tx.send(Arc::new(message));
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
