//! Window arithmetic on absolute Unix time in milliseconds.
//!
//! Every function here expects a non-zero `period`; generators reject a zero
//! period before any of these are reached.

/// Time-step counter of the window containing `now_millis`.
pub fn counter_at(now_millis: u64, period: u32) -> u64 {
    now_millis / 1000 / u64::from(period)
}

/// Milliseconds left before the window containing `now_millis` closes.
///
/// Always in `1..=period*1000`.
pub fn remaining_in_window(now_millis: u64, period: u32) -> u64 {
    let window = u64::from(period) * 1000;
    window - now_millis % window
}

/// Delay until just after the next period boundary.
pub fn schedule_next_boundary(now_millis: u64, period: u32, skew_ms: u64) -> u64 {
    remaining_in_window(now_millis, period) + skew_ms
}

/// `true` when strictly less than `warn_window_ms` is left in the window.
pub fn is_near_expiry(now_millis: u64, period: u32, warn_window_ms: u64) -> bool {
    remaining_in_window(now_millis, period) < warn_window_ms
}

/// Delay until the current window enters its warning window, or `None` if it
/// already has (or warnings are disabled).
pub fn delay_until_warning(now_millis: u64, period: u32, warn_window_ms: u64) -> Option<u64> {
    if warn_window_ms == 0 {
        return None;
    }
    let remaining = remaining_in_window(now_millis, period);
    // Land one millisecond inside the window since the check is strict
    (remaining >= warn_window_ms).then(|| (remaining - warn_window_ms + 1).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_floors_to_window() {
        assert_eq!(counter_at(0, 30), 0);
        assert_eq!(counter_at(29_999, 30), 0);
        assert_eq!(counter_at(30_000, 30), 1);
        assert_eq!(counter_at(59_000, 30), 1);
        assert_eq!(counter_at(1_111_111_109_000, 30), 37_037_036);
    }

    #[test]
    fn boundary_delay_examples() {
        assert_eq!(schedule_next_boundary(0, 30, 100), 30_100);
        assert_eq!(schedule_next_boundary(29_999, 30, 100), 101);
        assert_eq!(schedule_next_boundary(45_000, 30, 0), 15_000);
        assert_eq!(schedule_next_boundary(61_250, 60, 100), 58_850);
    }

    #[test]
    fn boundary_delay_stays_in_range() {
        let skew = 100;
        for period in [1u32, 30, 60] {
            let window = u64::from(period) * 1000;
            for now in (0..3 * window).step_by(97) {
                let d = schedule_next_boundary(now, period, skew);
                assert!(d > 0 && d <= window + skew, "delay {} at {}", d, now);
                assert_eq!(counter_at(now + d, period), counter_at(now, period) + 1);
            }
        }
    }

    #[test]
    fn near_expiry_is_strict() {
        assert!(!is_near_expiry(25_000, 30, 5_000));
        assert!(is_near_expiry(25_001, 30, 5_000));
        assert!(is_near_expiry(29_999, 30, 5_000));
        assert!(!is_near_expiry(30_000, 30, 5_000));
        assert!(!is_near_expiry(29_999, 30, 0));
    }

    #[test]
    fn warning_delay_lands_inside_window() {
        assert_eq!(delay_until_warning(0, 30, 5_000), Some(25_001));
        assert_eq!(delay_until_warning(25_000, 30, 5_000), Some(1));
        assert_eq!(delay_until_warning(25_001, 30, 5_000), None);
        assert_eq!(delay_until_warning(0, 30, 0), None);
        let d = delay_until_warning(12_345, 30, 5_000).unwrap();
        assert!(is_near_expiry(12_345 + d, 30, 5_000));
        assert!(!is_near_expiry(12_345 + d - 1, 30, 5_000));
    }
}
