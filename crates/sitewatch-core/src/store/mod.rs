// ── Live state ──
//
// Site registry, latest-reading cache and reception liveness. All three
// are safe to share behind an `Arc` and never block readers.

mod latest;
mod liveness;
mod registry;

pub use latest::LatestReadings;
pub use liveness::LivenessTracker;
pub use registry::{ApplyOutcome, Registry};
