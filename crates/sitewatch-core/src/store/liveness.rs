// ── Reception liveness ──
//
// Field controllers never announce that they went away; silence is the
// only signal. A channel that has not been heard from within the
// threshold is considered dead and its sensors are disabled.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use tracing::debug;

use super::Registry;
use crate::model::{ChannelKey, Site, SiteId};

pub struct LivenessTracker {
    last_seen: DashMap<ChannelKey, DateTime<Utc>>,
    threshold: TimeDelta,
}

impl LivenessTracker {
    pub fn new(threshold: Duration) -> Self {
        Self {
            last_seen: DashMap::new(),
            threshold: TimeDelta::from_std(threshold).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Note a reception. Times only move forward.
    pub fn record(&self, key: ChannelKey, received_at: DateTime<Utc>) {
        self.last_seen
            .entry(key)
            .and_modify(|seen| *seen = (*seen).max(received_at))
            .or_insert(received_at);
    }

    pub fn last_seen(&self, key: &ChannelKey) -> Option<DateTime<Utc>> {
        self.last_seen.get(key).map(|r| *r.value())
    }

    /// Channels silent for longer than the threshold at `now`.
    pub fn stale(&self, now: DateTime<Utc>) -> Vec<ChannelKey> {
        self.last_seen
            .iter()
            .filter(|r| now.signed_duration_since(*r.value()) > self.threshold)
            .map(|r| r.key().clone())
            .collect()
    }

    /// True when the channel was heard before but not within the
    /// threshold at `now`.
    pub fn is_stale(&self, key: &ChannelKey, now: DateTime<Utc>) -> bool {
        self.last_seen(key)
            .is_some_and(|seen| now.signed_duration_since(seen) > self.threshold)
    }

    /// True when any channel of the site was heard within the threshold.
    pub fn is_site_online(&self, site_id: SiteId, now: DateTime<Utc>) -> bool {
        self.last_seen.iter().any(|r| {
            r.key().site_id == site_id && now.signed_duration_since(*r.value()) <= self.threshold
        })
    }

    /// Disable sensors on stale channels. Returns the sites that changed.
    pub fn sweep(&self, registry: &Registry, now: DateTime<Utc>) -> Vec<Arc<Site>> {
        let stale = self.stale(now);
        if stale.is_empty() {
            return Vec::new();
        }
        let updated = registry.disable_channels(&stale, now, |key| self.is_stale(key, now));
        debug!(
            stale = stale.len(),
            sites_changed = updated.len(),
            "liveness sweep"
        );
        updated
    }
}
