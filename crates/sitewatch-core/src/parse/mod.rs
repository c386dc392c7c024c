// ── Wire parsing ──
//
// Pure functions from raw MQTT topic/payload to typed readings. Nothing
// here touches shared state.

mod classify;
mod payload;
mod topic;

pub use classify::infer_detector_type;
pub use payload::{DecodeError, decode, decode_at};
pub use topic::{SITE_CHANNEL, TopicAddress, TopicError, VENDOR_PREFIX, parse_topic};
