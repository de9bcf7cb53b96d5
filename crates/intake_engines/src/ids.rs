#![forbid(unsafe_code)]

use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(1)
        .max(1)
}

/// Correlation id for one submission attempt. Not a storage key: nothing
/// is persisted, identical payloads get distinct ids.
pub fn new_request_id() -> String {
    format!("req_{:012x}{:08x}", now_unix_ms(), rand::random::<u32>())
}
