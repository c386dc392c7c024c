use std::fmt;

use serde::Serialize;

use crate::model::SiteId;

/// Optional leading topic segment added by the controller firmware.
pub const VENDOR_PREFIX: &str = "PLCNEXT";

/// Channel id used when a topic addresses the site as a whole.
pub const SITE_CHANNEL: &str = "SITE";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    #[error("topic is empty")]
    Empty,

    #[error("topic has {0} segments, expected at most 2")]
    TooManySegments(usize),

    #[error("site segment `{0}` is not of the form <id>_<name>")]
    MalformedSite(String),

    #[error("site id `{0}` is not an unsigned integer")]
    InvalidSiteId(String),

    #[error("site name is empty")]
    EmptySiteName,
}

/// Site and channel addressed by a topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TopicAddress {
    pub site_id: SiteId,
    pub site_name: String,
    pub channel_id: String,
}

impl TopicAddress {
    pub fn is_site_level(&self) -> bool {
        self.channel_id == SITE_CHANNEL
    }

    /// `PLCNEXT/<id>_<name>/<channel>` for the given channel.
    pub fn canonical_topic(&self, channel_id: &str) -> String {
        format!(
            "{VENDOR_PREFIX}/{}_{}/{channel_id}",
            self.site_id, self.site_name
        )
    }
}

impl fmt::Display for TopicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_topic(&self.channel_id))
    }
}

/// Parse `[PLCNEXT/]<id>_<name>[/<channel>]`, tolerating a leading `/`.
pub fn parse_topic(raw: &str) -> Result<TopicAddress, TopicError> {
    let mut rest = raw.trim().trim_start_matches('/');
    if let Some((head, tail)) = rest.split_once('/') {
        if head.eq_ignore_ascii_case(VENDOR_PREFIX) {
            rest = tail.trim_start_matches('/');
        }
    }
    if rest.is_empty() {
        return Err(TopicError::Empty);
    }

    let segments: Vec<&str> = rest.split('/').collect();
    let (site_part, channel_part) = match segments.as_slice() {
        [site] => (*site, None),
        [site, channel] => (*site, Some(*channel)),
        _ => return Err(TopicError::TooManySegments(segments.len())),
    };

    let Some((id_token, name)) = site_part.split_once('_') else {
        return Err(TopicError::MalformedSite(site_part.to_owned()));
    };
    let site_id = id_token
        .parse::<SiteId>()
        .map_err(|_| TopicError::InvalidSiteId(id_token.to_owned()))?;
    if name.is_empty() {
        return Err(TopicError::EmptySiteName);
    }

    let channel_id = match channel_part {
        Some(channel) if !channel.is_empty() => channel.to_owned(),
        _ => SITE_CHANNEL.to_owned(),
    };

    Ok(TopicAddress {
        site_id,
        site_name: name.to_owned(),
        channel_id,
    })
}
