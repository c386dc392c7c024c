// ── Latest reading per channel ──

use std::sync::Arc;

use dashmap::DashMap;

use crate::model::{ChannelKey, SensorReading, SiteId};

/// Most recent accepted reading for every `(site, channel)`.
#[derive(Default)]
pub struct LatestReadings {
    readings: DashMap<ChannelKey, Arc<SensorReading>>,
}

impl LatestReadings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, reading: Arc<SensorReading>) {
        self.readings.insert(reading.channel_key(), reading);
    }

    pub fn latest(&self, site_id: SiteId, channel_id: &str) -> Option<Arc<SensorReading>> {
        self.readings
            .get(&ChannelKey::new(site_id, channel_id))
            .map(|r| Arc::clone(r.value()))
    }

    /// Every channel's latest reading for one site, ordered by channel.
    pub fn site_readings(&self, site_id: SiteId) -> Vec<Arc<SensorReading>> {
        let mut readings: Vec<Arc<SensorReading>> = self
            .readings
            .iter()
            .filter(|r| r.key().site_id == site_id)
            .map(|r| Arc::clone(r.value()))
            .collect();
        readings.sort_by(|a, b| a.channel_id.cmp(&b.channel_id));
        readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}
