//! Parsing of human-readable configuration values

use std::time::Duration;

/// Parse a duration string such as `"15s"`, `"1m"`, `"500ms"` or `"1h"`.
///
/// A bare number is read as seconds. Unparseable input yields 15 seconds,
/// the default push interval.
pub fn parse_duration(s: &str) -> Duration {
    let s = s.trim().to_lowercase();
    let (num_str, millis_per_unit) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1000)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60 * 1000)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 60 * 60 * 1000)
    } else {
        (s.as_str(), 1000)
    };

    num_str
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(millis_per_unit))
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(15))
}
