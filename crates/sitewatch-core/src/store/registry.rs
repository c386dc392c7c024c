// ── Autodiscovery registry ──
//
// One canonical `Site` per id. Every mutation happens while holding the
// site's map entry and goes through `Arc::make_mut`, so readers holding an
// older `Arc<Site>` keep a consistent snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::model::{
    ChannelKey, MonitorEvent, Sensor, SensorReading, Site, SiteDirectory, SiteId,
};
use crate::stream::SiteStream;

/// What a single `apply` changed.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub site_created: bool,
    pub sensor_created: bool,
    /// Site state right after the update.
    pub site: Arc<Site>,
}

pub struct Registry {
    sites: DashMap<SiteId, Arc<Site>>,
    snapshot: watch::Sender<Arc<Vec<Arc<Site>>>>,
    events: broadcast::Sender<MonitorEvent>,
    directory: SiteDirectory,
}

impl Registry {
    pub fn new(directory: SiteDirectory, events: broadcast::Sender<MonitorEvent>) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            sites: DashMap::new(),
            snapshot,
            events,
            directory,
        }
    }

    /// Fold one accepted reading into the catalog, creating the site and
    /// sensor on first sight.
    pub fn apply(&self, reading: &SensorReading) -> ApplyOutcome {
        let mut site_created = false;
        let mut new_sensor: Option<Arc<Sensor>> = None;

        let site = {
            let mut entry = self.sites.entry(reading.site_id).or_insert_with(|| {
                site_created = true;
                Arc::new(Site::new(
                    reading.site_id,
                    reading.site_name.clone(),
                    self.directory.get(reading.site_id),
                ))
            });
            let site = Arc::make_mut(entry.value_mut());
            site.touch(reading);

            if let Some(sensor) = site.sensor_mut(&reading.channel_id, &reading.tag) {
                let was_disabled = sensor.is_disabled();
                sensor.apply(reading);
                if was_disabled != sensor.is_disabled() {
                    info!(
                        site_id = reading.site_id,
                        channel = %reading.channel_id,
                        tag = %reading.tag,
                        disabled = sensor.is_disabled(),
                        "sensor enabled state changed"
                    );
                }
            } else {
                let index = site.insert_sensor(Sensor::from_reading(reading));
                new_sensor = site.sensors.get(index).cloned().map(Arc::new);
            }

            site.refresh_status(reading.timestamp);
            Arc::clone(entry.value())
        };

        self.rebuild_snapshot();

        if site_created {
            info!(site_id = site.id, site = %site.name, "discovered site");
            self.emit(MonitorEvent::SiteDiscovered {
                site_id: site.id,
                site_name: site.name.clone(),
            });
        }
        let sensor_created = new_sensor.is_some();
        if let Some(sensor) = new_sensor {
            info!(
                site_id = site.id,
                channel = %sensor.id,
                tag = %sensor.tag,
                detector = %sensor.detector_type,
                "discovered sensor"
            );
            self.emit(MonitorEvent::SensorDiscovered {
                sensor,
                site: Arc::clone(&site),
            });
        }
        self.emit(MonitorEvent::SiteUpdated(Arc::clone(&site)));

        ApplyOutcome {
            site_created,
            sensor_created,
            site,
        }
    }

    /// Mark every enabled sensor on the given channels disabled. Mutation
    /// runs first over all keys; the snapshot and `SiteUpdated` events go
    /// out afterwards, once per affected site.
    ///
    /// `still_stale` is asked again while the site entry is held, so a
    /// channel heard after the caller collected `keys` is left alone.
    pub fn disable_channels(
        &self,
        keys: &[ChannelKey],
        now: DateTime<Utc>,
        still_stale: impl Fn(&ChannelKey) -> bool,
    ) -> Vec<Arc<Site>> {
        let mut touched: Vec<SiteId> = Vec::new();

        for key in keys {
            let Some(mut entry) = self.sites.get_mut(&key.site_id) else {
                continue;
            };
            if !still_stale(key) {
                debug!(
                    site_id = key.site_id,
                    channel = %key.channel_id,
                    "channel heard again, not disabled"
                );
                continue;
            }
            let has_enabled = entry
                .channel_sensors(&key.channel_id)
                .any(|s| !s.is_disabled());
            if !has_enabled {
                continue;
            }

            let site = Arc::make_mut(entry.value_mut());
            for sensor in site.sensors.iter_mut().filter(|s| s.id == key.channel_id) {
                if sensor.disable() {
                    info!(
                        site_id = key.site_id,
                        channel = %key.channel_id,
                        tag = %sensor.tag,
                        "sensor silent past liveness threshold, disabled"
                    );
                }
            }
            site.refresh_status(now);
            if !touched.contains(&key.site_id) {
                touched.push(key.site_id);
            }
        }

        if touched.is_empty() {
            return Vec::new();
        }
        self.rebuild_snapshot();

        let updated: Vec<Arc<Site>> = touched.iter().filter_map(|id| self.site(*id)).collect();
        for site in &updated {
            self.emit(MonitorEvent::SiteUpdated(Arc::clone(site)));
        }
        updated
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn site(&self, site_id: SiteId) -> Option<Arc<Site>> {
        self.sites.get(&site_id).map(|r| Arc::clone(r.value()))
    }

    /// All sites ordered by id.
    pub fn sites(&self) -> Arc<Vec<Arc<Site>>> {
        self.snapshot.borrow().clone()
    }

    /// Sensors of one site in tag order; empty for an unknown site.
    pub fn sensors(&self, site_id: SiteId) -> Vec<Sensor> {
        self.site(site_id)
            .map(|site| site.sensors.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn subscribe(&self) -> SiteStream {
        SiteStream::new(self.snapshot.subscribe())
    }

    pub fn directory(&self) -> &SiteDirectory {
        &self.directory
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Collect inside `send_modify` so concurrent writers serialize on the
    /// watch lock and the last rebuild always sees every finished mutation.
    fn rebuild_snapshot(&self) {
        self.snapshot.send_modify(|snap| {
            let mut values: Vec<Arc<Site>> =
                self.sites.iter().map(|r| Arc::clone(r.value())).collect();
            values.sort_by_key(|s| s.id);
            *snap = Arc::new(values);
        });
    }

    fn emit(&self, event: MonitorEvent) {
        if self.events.send(event).is_err() {
            debug!("no event subscribers");
        }
    }
}
