//! Broker connection lifecycle with fixed-interval reconnection.
//!
//! [`ConnectionManager`] owns at most one MQTT session at a time. A
//! supervisor task drives the rumqttc event loop, forwards every inbound
//! publish into a bounded queue, and after an unexpected drop retries on a
//! fixed timer with the last-known options until it succeeds or
//! [`disconnect`](ConnectionManager::disconnect) is called.
//!
//! # Example
//!
//! ```rust,ignore
//! use sitewatch_api::{BrokerOptions, ConnectionManager};
//!
//! let (manager, mut inbound) = ConnectionManager::new(1024);
//! manager.connect(BrokerOptions::new("10.0.0.5", 1883)).await?;
//! manager.subscribe_all().await?;
//!
//! while let Some(msg) = inbound.recv().await {
//!     println!("{} -> {} bytes", msg.topic, msg.payload.len());
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, Event, Packet, Publish, QoS};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::mqtt::{BrokerOptions, SUBSCRIPTION_PATTERNS};

// ── Channel capacities ───────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 256;
const REQUEST_CHANNEL_CAPACITY: usize = 64;
const DISCONNECT_FLUSH: Duration = Duration::from_millis(250);

// ── Public types ─────────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Notifications emitted by the connection manager.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Fired whenever the connected flag flips.
    StatusChanged(bool),
    /// Human-readable lifecycle line for operator consoles.
    Log { at: DateTime<Utc>, message: String },
}

/// One publish received from the broker, stamped on arrival.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}

// ── ConnectionManager ────────────────────────────────────────────────

/// Owns the broker session and its reconnection timer.
///
/// Cheaply cloneable. Inbound messages leave through the receiver
/// returned by [`new`](Self::new), never through a callback, so the
/// transport task is never stalled by slow processing.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<ConnectionEvent>,
    inbound: mpsc::Sender<InboundMessage>,
    client: ArcSwapOption<AsyncClient>,
    subscriptions: ArcSwap<Vec<String>>,
    last_error: ArcSwapOption<String>,
    session: Mutex<Option<Session>>,
    dropped: AtomicU64,
}

struct Session {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ConnectionManager {
    /// Create a manager and the receiving end of its inbound queue.
    ///
    /// When the queue is full, new publishes are dropped and counted
    /// (see [`dropped_messages`](Self::dropped_messages)).
    pub fn new(queue_capacity: usize) -> (Self, mpsc::Receiver<InboundMessage>) {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (inbound, inbound_rx) = mpsc::channel(queue_capacity.max(1));

        let manager = Self {
            inner: Arc::new(Inner {
                state,
                events,
                inbound,
                client: ArcSwapOption::from(None),
                subscriptions: ArcSwap::from_pointee(Vec::new()),
                last_error: ArcSwapOption::from(None),
                session: Mutex::new(None),
                dropped: AtomicU64::new(0),
            }),
        };
        (manager, inbound_rx)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open a session and wait (bounded) for the broker's CONNACK.
    ///
    /// Any existing session is torn down first. A failed first attempt
    /// is reported to the caller and not retried; reconnection only
    /// kicks in after a session that was once established drops.
    pub async fn connect(&self, options: BrokerOptions) -> Result<(), Error> {
        options.validate()?;
        self.disconnect().await;

        let mut state_rx = self.inner.state.subscribe();
        self.inner.set_state(ConnectionState::Connecting);
        self.inner.last_error.store(None);
        self.inner
            .log(format!("Connecting to MQTT broker at {}", options.endpoint()));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(supervise(
            Arc::clone(&self.inner),
            options.clone(),
            cancel.clone(),
        ));
        *self.inner.session.lock().await = Some(Session { cancel, handle });

        let waited = tokio::time::timeout(
            options.connect_timeout,
            state_rx.wait_for(|s| matches!(s, ConnectionState::Connected | ConnectionState::Failed)),
        )
        .await
        .map(|res| res.map(|state| state.is_connected()));

        match waited {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false) | Err(_)) => {
                let reason = self
                    .last_error()
                    .unwrap_or_else(|| "connection closed before acknowledgement".into());
                self.disconnect().await;
                Err(Error::Connect {
                    host: options.host,
                    port: options.port,
                    reason,
                })
            }
            Err(_) => {
                self.disconnect().await;
                self.inner.log(format!(
                    "Connection to {} timed out",
                    options.endpoint()
                ));
                Err(Error::Timeout {
                    timeout_secs: options.connect_timeout.as_secs(),
                })
            }
        }
    }

    /// Tear down the session and cancel any pending reconnect timer.
    pub async fn disconnect(&self) {
        let session = self.inner.session.lock().await.take();
        let Some(session) = session else {
            return;
        };

        session.cancel.cancel();
        if let Err(e) = session.handle.await {
            tracing::warn!(error = %e, "MQTT supervisor task ended abnormally");
        }

        self.inner.client.store(None);
        let was_connected = self.is_connected();
        self.inner.set_state(ConnectionState::Disconnected);
        if was_connected {
            self.inner.log("Disconnected from MQTT broker");
        }
        tracing::debug!("MQTT session closed");
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Subscribe to the fixed wildcard set used for autodiscovery.
    ///
    /// Filters are remembered and re-issued after every reconnect. When
    /// no session is live they are only recorded.
    pub async fn subscribe_all(&self) -> Result<(), Error> {
        for pattern in SUBSCRIPTION_PATTERNS {
            self.subscribe(pattern).await?;
        }
        self.inner.log("Subscribed to auto-discovery for all sites");
        Ok(())
    }

    /// Subscribe to one additional topic filter.
    pub async fn subscribe(&self, filter: &str) -> Result<(), Error> {
        let filter = filter.trim();
        if filter.is_empty() {
            return Err(Error::InvalidOption {
                field: "topic",
                reason: "must not be empty".into(),
            });
        }

        self.inner.subscriptions.rcu(|current| {
            let mut next = Vec::clone(current);
            if !next.iter().any(|f| f == filter) {
                next.push(filter.to_owned());
            }
            next
        });

        let client = self.inner.client.load_full();
        match client {
            Some(client) => {
                client.subscribe(filter, QoS::AtMostOnce).await?;
                tracing::debug!(filter, "subscribed");
            }
            None => tracing::debug!(filter, "no live session, subscription deferred"),
        }
        Ok(())
    }

    /// Filters that will be (re)issued on every connect.
    pub fn subscriptions(&self) -> Vec<String> {
        Vec::clone(&self.inner.subscriptions.load())
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn is_connected(&self) -> bool {
        self.inner.state.borrow().is_connected()
    }

    /// Subscribe to connection state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Subscribe to status and log notifications.
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe()
    }

    /// Most recent connection failure, if any.
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.load_full().map(|e| String::clone(&e))
    }

    /// Messages discarded because the inbound queue was full.
    pub fn dropped_messages(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

// ── Shared state helpers ─────────────────────────────────────────────

impl Inner {
    /// Publish a new state, emitting `StatusChanged` only on a flip.
    fn set_state(&self, next: ConnectionState) {
        let now_connected = next.is_connected();
        let previous = self.state.send_replace(next);
        if previous.is_connected() != now_connected {
            let _ = self.events.send(ConnectionEvent::StatusChanged(now_connected));
        }
    }

    fn log(&self, message: impl Into<String>) {
        let _ = self.events.send(ConnectionEvent::Log {
            at: Utc::now(),
            message: message.into(),
        });
    }

    fn record_error(&self, reason: &str) {
        self.last_error.store(Some(Arc::new(reason.to_owned())));
    }

    fn forward(&self, publish: Publish) {
        let message = InboundMessage {
            topic: publish.topic,
            payload: publish.payload,
            received_at: Utc::now(),
        };
        match self.inbound.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(topic = %message.topic, dropped, "inbound queue full, dropping message");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("inbound queue closed, discarding message");
            }
        }
    }
}

// ── Supervisor ───────────────────────────────────────────────────────

enum SessionEnd {
    /// Explicit teardown.
    Cancelled,
    /// Session never reached CONNACK.
    Failed { reason: String },
    /// An established session dropped.
    Lost { reason: String },
}

/// Main loop: session → on unexpected drop, wait the fixed interval → new session.
async fn supervise(inner: Arc<Inner>, options: BrokerOptions, cancel: CancellationToken) {
    let mut attempt: u32 = 0;
    let mut ever_connected = false;

    loop {
        match run_session(&inner, &options, &cancel, attempt).await {
            SessionEnd::Cancelled => break,
            SessionEnd::Lost { reason } => {
                ever_connected = true;
                attempt = 0;
                tracing::warn!(reason, "MQTT connection lost");
                inner.record_error(&reason);
                inner.set_state(ConnectionState::Disconnected);
                inner.log(format!("Disconnected from MQTT broker: {reason}"));
            }
            SessionEnd::Failed { reason } => {
                inner.record_error(&reason);
                if !ever_connected {
                    tracing::warn!(reason, "MQTT connection failed");
                    inner.set_state(ConnectionState::Failed);
                    inner.log(format!("Connection failed: {reason}"));
                    break;
                }
                tracing::info!(reason, attempt, "MQTT reconnection attempt failed");
                inner.set_state(ConnectionState::Disconnected);
                inner.log(format!("Reconnection failed: {reason}"));
            }
        }

        attempt += 1;
        inner.set_state(ConnectionState::Reconnecting { attempt });
        tracing::info!(
            attempt,
            delay_ms = u64::try_from(options.reconnect_interval.as_millis()).unwrap_or(u64::MAX),
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(options.reconnect_interval) => {}
        }

        inner.log("Attempting to reconnect...");
    }

    inner.client.store(None);
    tracing::debug!("MQTT supervisor exiting");
}

/// Drive one rumqttc event loop from CONNECT until it ends.
async fn run_session(
    inner: &Inner,
    options: &BrokerOptions,
    cancel: &CancellationToken,
    attempt: u32,
) -> SessionEnd {
    let client_id = options.client_id();
    let (client, mut event_loop) =
        AsyncClient::new(options.to_mqtt_options(&client_id), REQUEST_CHANNEL_CAPACITY);
    tracing::info!(client_id, endpoint = %options.endpoint(), attempt, "connecting to MQTT broker");

    let mut connected = false;
    let deadline = tokio::time::sleep(options.connect_timeout);
    tokio::pin!(deadline);

    let ended = |connected: bool, reason: String| {
        if connected {
            inner.client.store(None);
            SessionEnd::Lost { reason }
        } else {
            SessionEnd::Failed { reason }
        }
    };

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                inner.client.store(None);
                if client.try_disconnect().is_ok() {
                    // Give the event loop a moment to flush DISCONNECT.
                    let _ = tokio::time::timeout(DISCONNECT_FLUSH, event_loop.poll()).await;
                }
                return SessionEnd::Cancelled;
            }
            () = &mut deadline, if !connected => {
                return SessionEnd::Failed {
                    reason: format!(
                        "no acknowledgement within {}s",
                        options.connect_timeout.as_secs()
                    ),
                };
            }
            polled = event_loop.poll() => match polled {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    connected = true;
                    tracing::info!(code = ?ack.code, "MQTT connection established");
                    inner.client.store(Some(Arc::new(client.clone())));
                    inner.set_state(ConnectionState::Connected);
                    inner.log("Connected to MQTT broker");
                    resubscribe(&client, &inner.subscriptions.load());
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    tracing::trace!(topic = %publish.topic, bytes = publish.payload.len(), "publish received");
                    inner.forward(publish);
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    tracing::debug!(pkid = ack.pkid, "subscription acknowledged");
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    return ended(connected, "broker sent disconnect".into());
                }
                Ok(_) => {}
                Err(e) => return ended(connected, e.to_string()),
            }
        }
    }
}

/// Re-issue remembered filters on a fresh session.
///
/// Uses `try_subscribe` because the event loop is being polled by the
/// caller; an awaiting send could otherwise wait on itself.
fn resubscribe(client: &AsyncClient, filters: &[String]) {
    for filter in filters {
        if let Err(e) = client.try_subscribe(filter.as_str(), QoS::AtMostOnce) {
            tracing::warn!(filter, error = %e, "failed to queue subscription");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
