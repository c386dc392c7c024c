// ── Controller payload decoding ──
//
// Field controllers publish a flat JSON object of channel fields named
// `<prefix>CH<n>_<suffix>`, e.g. `rCH12_PV` or `strCH12_TAG`. Values are
// usually strings in invariant number format; bare JSON numbers are
// accepted too.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::classify::infer_detector_type;
use super::topic::TopicAddress;
use crate::model::{DetectorType, MAX_STATUS_CODE, SensorReading, SensorStatus};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload carries no channel fields")]
    NoChannel,

    #[error("channel {channel} has an empty tag")]
    EmptyTag { channel: String },

    #[error("status code {0} is outside 0..={MAX_STATUS_CODE}")]
    StatusOutOfRange(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Current,
    ProcessValue,
    Status,
    DetectorType,
    Tag,
}

impl Field {
    fn from_suffix(suffix: &str) -> Option<Self> {
        const SUFFIXES: [(&str, Field); 5] = [
            ("mA", Field::Current),
            ("PV", Field::ProcessValue),
            ("DetStatus", Field::Status),
            ("DetType", Field::DetectorType),
            ("TAG", Field::Tag),
        ];
        SUFFIXES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(suffix))
            .map(|&(_, field)| field)
    }
}

/// Split `rCH12_PV` into `(12, ProcessValue)`. The `CH` marker is matched
/// case-insensitively and must be followed by digits and `_`.
fn split_key(key: &str) -> Option<(u32, Field)> {
    let upper = key.to_ascii_uppercase();
    let mut from = 0;
    while let Some(pos) = upper[from..].find("CH") {
        let digits_start = from + pos + 2;
        let digits = key[digits_start..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        let suffix_start = digits_start + digits;
        if digits > 0 && key[suffix_start..].starts_with('_') {
            let number = key[digits_start..suffix_start].parse().ok()?;
            let field = Field::from_suffix(&key[suffix_start + 1..])?;
            return Some((number, field));
        }
        from = digits_start;
    }
    None
}

#[derive(Debug, Default)]
struct Fields<'a> {
    current: Option<&'a Value>,
    process_value: Option<&'a Value>,
    status: Option<&'a Value>,
    detector_type: Option<&'a Value>,
    tag: Option<&'a Value>,
}

impl<'a> Fields<'a> {
    fn set(&mut self, field: Field, value: &'a Value) {
        let slot = match field {
            Field::Current => &mut self.current,
            Field::ProcessValue => &mut self.process_value,
            Field::Status => &mut self.status,
            Field::DetectorType => &mut self.detector_type,
            Field::Tag => &mut self.tag,
        };
        *slot = Some(value);
    }
}

fn number(value: Option<&Value>, key: &str, channel: &str) -> f64 {
    let parsed = match value {
        None => return 0.0,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    match parsed {
        Some(v) if v.is_finite() => v,
        _ => {
            warn!(channel, field = key, value = ?value, "unparsable numeric field, using 0");
            0.0
        }
    }
}

fn integer(value: Option<&Value>, key: &str, channel: &str) -> i64 {
    let parsed = match value {
        None => return 0,
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };
    parsed.unwrap_or_else(|| {
        warn!(channel, field = key, value = ?value, "unparsable integer field, using 0");
        0
    })
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_owned(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Decode one payload, stamping the reading with the current time.
pub fn decode(payload: &[u8], topic: &TopicAddress) -> Result<SensorReading, DecodeError> {
    decode_at(payload, topic, Utc::now())
}

/// Decode one payload with an explicit decode time.
pub fn decode_at(
    payload: &[u8],
    topic: &TopicAddress,
    now: DateTime<Utc>,
) -> Result<SensorReading, DecodeError> {
    let value: Value = serde_json::from_slice(payload)?;
    let Value::Object(object) = value else {
        return Err(DecodeError::NotAnObject);
    };
    decode_object(&object, topic, now)
}

fn decode_object(
    object: &Map<String, Value>,
    topic: &TopicAddress,
    now: DateTime<Utc>,
) -> Result<SensorReading, DecodeError> {
    let mut pinned: Option<u32> = None;
    let mut fields = Fields::default();

    for (key, value) in object {
        let Some((number, field)) = split_key(key) else {
            continue;
        };
        match pinned {
            None => pinned = Some(number),
            Some(n) if n != number => {
                debug!(key, pinned = n, "skipping field for another channel");
                continue;
            }
            Some(_) => {}
        }
        fields.set(field, value);
    }

    let number_id = pinned.ok_or(DecodeError::NoChannel)?;
    let channel_id = format!("CH{number_id}");
    if !topic.is_site_level() && !topic.channel_id.eq_ignore_ascii_case(&channel_id) {
        debug!(
            topic_channel = %topic.channel_id,
            channel = %channel_id,
            "payload channel differs from topic channel"
        );
    }

    let tag = text(fields.tag);
    if tag.is_empty() {
        return Err(DecodeError::EmptyTag {
            channel: channel_id,
        });
    }

    let status_code = integer(fields.status, "DetStatus", &channel_id);
    let status = SensorStatus::from_code(status_code)
        .ok_or(DecodeError::StatusOutOfRange(status_code))?;

    let current_ma = number(fields.current, "mA", &channel_id);
    let process_value = number(fields.process_value, "PV", &channel_id);

    let detector_type = match integer(fields.detector_type, "DetType", &channel_id) {
        0 => infer_detector_type(process_value, current_ma),
        code => DetectorType::from_code(code),
    };

    // Bounded by MAX_STATUS_CODE above.
    let status_code = u8::try_from(status_code).unwrap_or(u8::MAX);

    Ok(SensorReading {
        site_id: topic.site_id,
        site_name: topic.site_name.clone(),
        topic: topic.canonical_topic(&channel_id),
        channel_id,
        tag,
        process_value,
        current_ma,
        detector_type,
        status,
        status_code,
        timestamp: now,
    })
}
