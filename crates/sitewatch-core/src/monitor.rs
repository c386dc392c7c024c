// ── Monitor ──
//
// Wires the transport, parsers, registry and liveness tracker together
// and owns the background tasks. This is the entry point for embedders.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sitewatch_api::{ConnectionEvent, ConnectionManager, ConnectionState, InboundMessage};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::error::CoreError;
use crate::model::{MonitorEvent, Sensor, SensorReading, Site, SiteId};
use crate::parse::{DecodeError, decode, parse_topic};
use crate::store::{LatestReadings, LivenessTracker, Registry};
use crate::stream::SiteStream;

const EVENT_CHANNEL_SIZE: usize = 256;

/// The main entry point for consumers.
///
/// Cheaply cloneable. `connect` starts three background tasks: the
/// ingest consumer draining the inbound queue, the liveness sweep and a
/// forwarder turning transport notifications into [`MonitorEvent`]s.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    config: MonitorConfig,
    connection: ConnectionManager,
    inbound_rx: Mutex<Option<mpsc::Receiver<InboundMessage>>>,
    registry: Registry,
    latest: LatestReadings,
    liveness: LivenessTracker,
    event_tx: broadcast::Sender<MonitorEvent>,
    background: Mutex<Option<Background>>,
}

struct Background {
    cancel: CancellationToken,
    /// Hands the inbound receiver back on exit so a later `connect` can
    /// resume draining the same queue.
    ingest: JoinHandle<mpsc::Receiver<InboundMessage>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Monitor {
    /// Build a monitor. Does NOT connect; call [`connect()`](Self::connect).
    pub fn new(config: MonitorConfig) -> Self {
        let (connection, inbound_rx) = ConnectionManager::new(config.queue_capacity);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let registry = Registry::new(config.directory.clone(), event_tx.clone());
        let liveness = LivenessTracker::new(config.liveness.threshold);

        Self {
            inner: Arc::new(MonitorInner {
                config,
                connection,
                inbound_rx: Mutex::new(Some(inbound_rx)),
                registry,
                latest: LatestReadings::new(),
                liveness,
                event_tx,
                background: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Connect to the broker, subscribe for autodiscovery and start the
    /// background tasks.
    ///
    /// A failed initial connect is returned as an error and not retried.
    /// Once connected, drops are retried on the configured interval until
    /// [`disconnect()`](Self::disconnect).
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.disconnect().await;

        let Some(inbound_rx) = self.inner.inbound_rx.lock().await.take() else {
            return Err(CoreError::Internal("inbound queue is not available".into()));
        };

        let cancel = CancellationToken::new();
        let forward = tokio::spawn(forward_task(
            Arc::clone(&self.inner),
            self.inner.connection.events(),
            cancel.clone(),
        ));
        let ingest = tokio::spawn(ingest_task(
            Arc::clone(&self.inner),
            inbound_rx,
            cancel.clone(),
        ));
        let sweep = tokio::spawn(sweep_task(
            Arc::clone(&self.inner),
            self.inner.config.liveness.sweep_interval,
            cancel.clone(),
        ));
        *self.inner.background.lock().await = Some(Background {
            cancel,
            ingest,
            tasks: vec![forward, sweep],
        });

        if let Err(e) = self.open_session().await {
            self.disconnect().await;
            return Err(e);
        }
        info!(endpoint = %self.inner.config.broker.endpoint(), "monitor connected");
        Ok(())
    }

    async fn open_session(&self) -> Result<(), CoreError> {
        let broker = &self.inner.config.broker;
        self.inner.connection.connect(broker.to_options()).await?;
        self.inner.connection.subscribe_all().await?;
        for topic in &broker.extra_topics {
            self.inner.connection.subscribe(topic).await?;
        }
        Ok(())
    }

    /// Close the broker session, cancel any pending reconnect and stop
    /// the background tasks. Discovered state is kept.
    pub async fn disconnect(&self) {
        self.inner.connection.disconnect().await;

        let background = self.inner.background.lock().await.take();
        let Some(background) = background else {
            return;
        };
        background.cancel.cancel();
        for handle in background.tasks {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        match background.ingest.await {
            Ok(rx) => *self.inner.inbound_rx.lock().await = Some(rx),
            Err(e) => error!(error = %e, "ingest task ended abnormally, inbound queue lost"),
        }
        debug!("monitor stopped");
    }

    /// Subscribe to an additional topic filter on the live session.
    pub async fn subscribe(&self, filter: &str) -> Result<(), CoreError> {
        self.inner.connection.subscribe(filter).await?;
        Ok(())
    }

    // ── Ingestion ────────────────────────────────────────────────────

    /// Run one inbound message through parse, decode and apply.
    ///
    /// The ingest task calls this for every queued message; it is public
    /// so embedders and tests can feed messages directly.
    pub fn ingest(&self, message: &InboundMessage) -> Result<Arc<SensorReading>, CoreError> {
        self.inner.ingest(message)
    }

    /// Run a liveness sweep now. Returns the sites whose status changed.
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<Arc<Site>> {
        self.inner.liveness.sweep(&self.inner.registry, now)
    }

    // ── State observation ────────────────────────────────────────────

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    /// Subscribe to discovery, update and connection notifications.
    pub fn events(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Reactive all-sites snapshot.
    pub fn subscribe_sites(&self) -> SiteStream {
        self.inner.registry.subscribe()
    }

    /// Messages lost because the inbound queue was full.
    pub fn dropped_messages(&self) -> u64 {
        self.inner.connection.dropped_messages()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn site(&self, site_id: SiteId) -> Option<Arc<Site>> {
        self.inner.registry.site(site_id)
    }

    pub fn sites(&self) -> Arc<Vec<Arc<Site>>> {
        self.inner.registry.sites()
    }

    pub fn sensors(&self, site_id: SiteId) -> Result<Vec<Sensor>, CoreError> {
        self.site(site_id)
            .map(|site| site.sensors.clone())
            .ok_or(CoreError::SiteNotFound { site_id })
    }

    pub fn latest_reading(&self, site_id: SiteId, channel_id: &str) -> Option<Arc<SensorReading>> {
        self.inner.latest.latest(site_id, channel_id)
    }

    pub fn site_readings(&self, site_id: SiteId) -> Vec<Arc<SensorReading>> {
        self.inner.latest.site_readings(site_id)
    }

    /// A site is online while the broker session is up and any of its
    /// channels was heard within the liveness threshold.
    pub fn is_site_online(&self, site_id: SiteId) -> bool {
        self.is_site_online_at(site_id, Utc::now())
    }

    pub fn is_site_online_at(&self, site_id: SiteId, now: DateTime<Utc>) -> bool {
        self.is_connected() && self.inner.liveness.is_site_online(site_id, now)
    }
}

impl MonitorInner {
    fn ingest(&self, message: &InboundMessage) -> Result<Arc<SensorReading>, CoreError> {
        let address = parse_topic(&message.topic)?;
        let reading = Arc::new(decode(&message.payload, &address)?);

        // reception first so a concurrent sweep never sees the update as stale
        self.liveness
            .record(reading.channel_key(), message.received_at);
        self.registry.apply(&reading);
        self.latest.record(Arc::clone(&reading));
        self.emit(MonitorEvent::ReadingUpdated(Arc::clone(&reading)));
        Ok(reading)
    }

    fn emit(&self, event: MonitorEvent) {
        // No receivers is fine; events are best-effort.
        let _ = self.event_tx.send(event);
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn ingest_task(
    inner: Arc<MonitorInner>,
    mut rx: mpsc::Receiver<InboundMessage>,
    cancel: CancellationToken,
) -> mpsc::Receiver<InboundMessage> {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            message = rx.recv() => {
                let Some(message) = message else { break };
                process(&inner, &message);
            }
        }
    }
    rx
}

/// Handle one message; nothing here may take the ingest loop down.
fn process(inner: &MonitorInner, message: &InboundMessage) -> Option<Arc<SensorReading>> {
    process_with(message, || inner.ingest(message))
}

fn process_with(
    message: &InboundMessage,
    handle: impl FnOnce() -> Result<Arc<SensorReading>, CoreError>,
) -> Option<Arc<SensorReading>> {
    match std::panic::catch_unwind(AssertUnwindSafe(handle)) {
        Ok(Ok(reading)) => {
            debug!(
                site_id = reading.site_id,
                channel = %reading.channel_id,
                value = reading.process_value,
                status = %reading.status,
                "reading applied"
            );
            Some(reading)
        }
        Ok(Err(CoreError::Decode(
            e @ (DecodeError::EmptyTag { .. } | DecodeError::StatusOutOfRange(_)),
        ))) => {
            warn!(topic = %message.topic, error = %e, "payload rejected");
            None
        }
        Ok(Err(e)) => {
            debug!(topic = %message.topic, error = %e, "message ignored");
            None
        }
        Err(_) => {
            error!(topic = %message.topic, "panic while processing message, skipped");
            None
        }
    }
}

async fn sweep_task(inner: Arc<MonitorInner>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let changed = inner.liveness.sweep(&inner.registry, Utc::now());
                if !changed.is_empty() {
                    info!(sites = changed.len(), "liveness sweep disabled silent sensors");
                }
            }
        }
    }
}

async fn forward_task(
    inner: Arc<MonitorInner>,
    mut rx: broadcast::Receiver<ConnectionEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                // the teardown notifications are already queued
                while let Ok(event) = rx.try_recv() {
                    inner.emit(translate(event));
                }
                break;
            }
            event = rx.recv() => match event {
                Ok(event) => inner.emit(translate(event)),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "connection notifications lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

fn translate(event: ConnectionEvent) -> MonitorEvent {
    match event {
        ConnectionEvent::StatusChanged(connected) => MonitorEvent::ConnectionChanged(connected),
        ConnectionEvent::Log { at, message } => MonitorEvent::Log { at, message },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::model::{SensorStatus, SiteCondition};

    const SAMPLE: &str = r#"{"rCH12_mA":"1.55E+01","rCH12_PV":"2.30E+01","iCH12_DetStatus":"0","iCH12_DetType":"1","strCH12_TAG":"KGD-007"}"#;

    fn monitor() -> Monitor {
        Monitor::new(MonitorConfig::default())
    }

    #[test]
    fn ingest_discovers_and_records() {
        let monitor = monitor();
        let reading = monitor
            .ingest(&InboundMessage::new("PLCNEXT/7_NorthSite/CH12", SAMPLE))
            .unwrap();

        assert_eq!(reading.tag, "KGD-007");
        let site = monitor.site(7).unwrap();
        assert_eq!(site.name, "NorthSite");
        assert_eq!(site.condition(), SiteCondition::Normal);
        assert_eq!(monitor.sensors(7).unwrap().len(), 1);
        assert_eq!(monitor.latest_reading(7, "CH12").unwrap().tag, "KGD-007");
        assert_eq!(monitor.site_readings(7).len(), 1);
    }

    #[test]
    fn rejected_messages_change_nothing() {
        let monitor = monitor();
        assert!(matches!(
            monitor.ingest(&InboundMessage::new("garbage", SAMPLE)),
            Err(CoreError::Topic(_))
        ));
        let bad_status = SAMPLE.replace(r#""iCH12_DetStatus":"0""#, r#""iCH12_DetStatus":"15""#);
        assert!(matches!(
            monitor.ingest(&InboundMessage::new("7_NorthSite/CH12", bad_status)),
            Err(CoreError::Decode(DecodeError::StatusOutOfRange(15)))
        ));
        assert!(monitor.sites().is_empty());
        assert!(matches!(
            monitor.sensors(7),
            Err(CoreError::SiteNotFound { site_id: 7 })
        ));
    }

    #[test]
    fn sites_are_offline_while_disconnected() {
        let monitor = monitor();
        monitor
            .ingest(&InboundMessage::new("PLCNEXT/7_NorthSite/CH12", SAMPLE))
            .unwrap();
        assert!(!monitor.is_site_online(7));
    }

    #[test]
    fn sweep_disables_silent_channels() {
        let monitor = monitor();
        let message = InboundMessage::new("PLCNEXT/7_NorthSite/CH12", SAMPLE);
        monitor.ingest(&message).unwrap();

        assert!(monitor.sweep(message.received_at + TimeDelta::seconds(80)).is_empty());
        let changed = monitor.sweep(message.received_at + TimeDelta::seconds(95));
        assert_eq!(changed.len(), 1);
        assert_eq!(
            monitor.sensors(7).unwrap()[0].current.status,
            SensorStatus::DetectorDisabled
        );
    }

    #[test]
    fn panics_in_processing_are_contained() {
        let monitor = monitor();
        let poisoned = InboundMessage::new("PLCNEXT/7_NorthSite/CH12", SAMPLE);
        let skipped = process_with(&poisoned, || panic!("decoder blew up"));
        assert!(skipped.is_none());
        assert!(monitor.site(7).is_none());

        // the next message still goes through
        let applied = process(
            &monitor.inner,
            &InboundMessage::new("PLCNEXT/7_NorthSite/CH12", SAMPLE),
        );
        assert_eq!(applied.unwrap().tag, "KGD-007");
        assert!(monitor.site(7).is_some());
    }

    #[test]
    fn rejected_messages_are_skipped_without_panicking() {
        let monitor = monitor();
        assert!(process(&monitor.inner, &InboundMessage::new("nope", "{}")).is_none());
        assert!(monitor.sites().is_empty());
    }

    #[tokio::test]
    async fn failed_connect_leaves_monitor_reusable() {
        let mut config = MonitorConfig::default();
        config.broker.host = String::new();
        let monitor = Monitor::new(config);

        assert!(matches!(
            monitor.connect().await,
            Err(CoreError::Config { .. })
        ));
        assert!(monitor.inner.inbound_rx.lock().await.is_some());
        assert!(monitor.inner.background.lock().await.is_none());
    }

    #[tokio::test]
    async fn ingest_task_drains_queue_and_returns_receiver() {
        let monitor = monitor();
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let mut events = monitor.events();
        let handle = tokio::spawn(ingest_task(
            Arc::clone(&monitor.inner),
            rx,
            cancel.clone(),
        ));

        tx.send(InboundMessage::new("PLCNEXT/7_NorthSite/CH12", SAMPLE))
            .await
            .unwrap();
        loop {
            if let MonitorEvent::ReadingUpdated(reading) = events.recv().await.unwrap() {
                assert_eq!(reading.channel_id, "CH12");
                break;
            }
        }

        cancel.cancel();
        let rx = handle.await.unwrap();
        assert!(!rx.is_closed());
    }
}
