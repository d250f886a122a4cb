//! Counter arithmetic shared by every metric group.
//!
//! Raw counters only ever grow, so an interval value is the difference between
//! two readings. A reading lower than its predecessor is taken as a single
//! wraparound of the 64-bit counter.

/// Difference between two readings of a monotonically increasing counter.
///
/// When `curr < prev` the counter is assumed to have wrapped once and the
/// result is `u64::MAX - prev + curr`.
#[inline]
pub fn wrapping_delta(curr: u64, prev: u64) -> u64 {
    if curr < prev {
        u64::MAX - prev + curr
    } else {
        curr - prev
    }
}

/// Sum of interval deltas in modular arithmetic.
///
/// A counter that went backwards yields a delta near `u64::MAX`; adding it
/// wraps instead of overflowing, so the total stays the modular sum of the
/// raw differences.
#[inline]
pub fn wrapping_sum(deltas: impl IntoIterator<Item = u64>) -> u64 {
    deltas.into_iter().fold(0, u64::wrapping_add)
}

/// Denominator guard: zero becomes one so idle intervals yield `0`.
#[inline]
pub fn safe_divisor(x: u64) -> u64 {
    if x == 0 { 1 } else { x }
}

/// `100 * part / total`, with `total` guarded by [`safe_divisor`].
#[inline]
pub fn percent(part: u64, total: u64) -> f64 {
    100.0 * part as f64 / safe_divisor(total) as f64
}

/// Per-second rate of an interval delta spanning `2^shift` seconds.
#[inline]
pub fn per_second(delta: u64, shift: u32) -> u64 {
    delta >> shift.min(63)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapping_delta_forward() {
        assert_eq!(wrapping_delta(150, 100), 50);
        assert_eq!(wrapping_delta(u64::MAX, 0), u64::MAX);
    }

    #[test]
    fn test_wrapping_delta_same_value_is_zero() {
        for x in [0, 1, 42, u64::MAX / 2, u64::MAX] {
            assert_eq!(wrapping_delta(x, x), 0);
        }
    }

    #[test]
    fn test_wrapping_delta_wraparound() {
        assert_eq!(wrapping_delta(5, u64::MAX - 10), 15);
        assert_eq!(wrapping_delta(0, 1), u64::MAX - 1);
        assert_eq!(wrapping_delta(0, u64::MAX), 0);
    }

    #[test]
    fn test_wrapping_sum() {
        assert_eq!(wrapping_sum([50, 20, 200, 10]), 280);
        assert_eq!(wrapping_sum(std::iter::empty()), 0);
        // iowait 60 -> 50 contributes -10 modulo 2^64
        assert_eq!(wrapping_sum([50, 20, 200, wrapping_delta(50, 60)]), 259);
        assert_eq!(wrapping_sum([u64::MAX, u64::MAX]), u64::MAX - 1);
    }

    #[test]
    fn test_safe_divisor() {
        assert_eq!(safe_divisor(0), 1);
        assert_eq!(safe_divisor(1), 1);
        assert_eq!(safe_divisor(230), 230);
    }

    #[test]
    fn test_percent_over_idle_interval_is_zero() {
        let idle = wrapping_delta(1000, 1000);
        assert_eq!(percent(idle, idle), 0.0);
    }

    #[test]
    fn test_per_second() {
        assert_eq!(per_second(400, 0), 400);
        assert_eq!(per_second(400, 2), 100);
        assert_eq!(per_second(400, 31), 0);
    }
}
