//! Wall-clock helpers

use std::time::{SystemTime, UNIX_EPOCH};

/// Current timestamp in seconds since Unix epoch
///
/// Expiry of approval codes and download tokens is checked by comparing
/// against this value at validation time; there are no timer callbacks.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}
