//! Timestamp utilities
//!
//! All timestamps exchanged by Locus are whole seconds since the UNIX epoch.

use chrono::Utc;

/// Current time as epoch seconds
pub fn now_epoch_secs() -> i64 {
    Utc::now().timestamp()
}

/// Convert a (possibly fractional) epoch-seconds value to whole seconds
///
/// Beacon agents report `time.time()`-style floats; the fraction is dropped.
pub fn epoch_secs_from_f64(secs: f64) -> i64 {
    secs.trunc() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_epoch_secs_is_plausible() {
        let timestamp = now_epoch_secs();
        // After 2000-01-01 and before 2100-01-01
        assert!(timestamp > 946_684_800);
        assert!(timestamp < 4_102_444_800);
    }

    #[test]
    fn test_epoch_secs_truncates_fraction() {
        assert_eq!(epoch_secs_from_f64(1_700_000_000.0), 1_700_000_000);
        assert_eq!(epoch_secs_from_f64(1_700_000_000.999), 1_700_000_000);
    }
}
