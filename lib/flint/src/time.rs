use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the unix epoch, for audit records and persistence rows.
/// A clock before the epoch reads as 0 rather than failing the caller.
#[inline]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
