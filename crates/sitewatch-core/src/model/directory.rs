// ── Site directory ──
//
// Optional operator-supplied metadata. Discovery works without it; when a
// site id is known here the new site picks up its display name and county.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Site, SiteCondition, SiteId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteMetadata {
    pub display_name: Option<String>,
    pub county_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDirectory {
    #[serde(default)]
    pub sites: HashMap<SiteId, SiteMetadata>,
}

impl SiteDirectory {
    pub fn get(&self, site_id: SiteId) -> Option<&SiteMetadata> {
        self.sites.get(&site_id)
    }

    pub fn insert(&mut self, site_id: SiteId, metadata: SiteMetadata) {
        self.sites.insert(site_id, metadata);
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// Alarm/fault roll-up over a group of sites (typically one county).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStatus {
    pub has_alarm: bool,
    pub has_fault: bool,
    pub site_count: usize,
}

impl AggregateStatus {
    pub fn condition(&self) -> SiteCondition {
        SiteCondition::from_flags(self.has_alarm, self.has_fault)
    }
}

pub fn aggregate<'a>(sites: impl IntoIterator<Item = &'a Site>) -> AggregateStatus {
    sites
        .into_iter()
        .fold(AggregateStatus::default(), |mut acc, site| {
            acc.has_alarm |= site.status.has_alarm;
            acc.has_fault |= site.status.has_fault;
            acc.site_count += 1;
            acc
        })
}

/// Roll-up for the sites assigned to `county_id`.
pub fn county_status<'a>(
    county_id: &str,
    sites: impl IntoIterator<Item = &'a Site>,
) -> AggregateStatus {
    aggregate(
        sites
            .into_iter()
            .filter(|s| s.county_id.as_deref() == Some(county_id)),
    )
}
