//! Millisecond-epoch time source.

use chrono::Utc;

/// Smallest plausible millisecond timestamp. Anything at or below this is a
/// second-resolution value that slipped through unconverted.
pub const MIN_EPOCH_MS: i64 = 100_000_000_000;

/// Current time as milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Whether a timestamp clears the millisecond plausibility floor.
pub fn plausible_ms(ts: i64) -> bool {
    ts > MIN_EPOCH_MS
}
