//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for service start times and event envelopes.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Minutes elapsed between two timestamps, clamped to zero.
#[must_use]
pub fn elapsed_minutes(from: Timestamp, to: Timestamp) -> f64 {
    let millis = (to - from).num_milliseconds().max(0);
    millis as f64 / 60_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_measure_elapsed_minutes() {
        let start = now();
        let end = start + Duration::seconds(90);
        let minutes = elapsed_minutes(start, end);
        assert!((minutes - 1.5).abs() < 1e-9);
    }

    #[test]
    fn should_clamp_negative_elapsed_to_zero() {
        let start = now();
        let earlier = start - Duration::seconds(30);
        assert_eq!(elapsed_minutes(start, earlier), 0.0);
    }
}
