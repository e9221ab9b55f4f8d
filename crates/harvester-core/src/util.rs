// ---------------------------------------------------------------------------
// Cheap randomness based on std, avoiding the `rand` crate.
// Uses a simple xorshift seeded from the current time.
// ---------------------------------------------------------------------------

use std::sync::atomic::{AtomicU64, Ordering};

static SALT: AtomicU64 = AtomicU64::new(0x9E37_79B9_7F4A_7C15);

/// Returns a pseudo-random value in `[0, max)`; `0` when `max` is zero.
///
/// Good enough for pointer jitter, not crypto.
pub fn random_below(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    // Successive calls within the same clock tick still diverge.
    let mut x = nanos ^ SALT.fetch_add(0x6A09_E667_F3BC_C909, Ordering::Relaxed);
    if x == 0 {
        x = 0x2545_F491_4F6C_DD1D;
    }
    // xorshift64
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % max
}

/// A random point inside a `width` × `height` viewport.
pub fn random_point(width: u32, height: u32) -> (f64, f64) {
    (
        random_below(u64::from(width)) as f64,
        random_below(u64::from(height)) as f64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_below_is_bounded() {
        for _ in 0..1000 {
            assert!(random_below(7) < 7);
        }
        assert_eq!(random_below(0), 0);
        assert_eq!(random_below(1), 0);
    }

    #[test]
    fn random_point_stays_in_viewport() {
        for _ in 0..200 {
            let (x, y) = random_point(800, 600);
            assert!((0.0..800.0).contains(&x));
            assert!((0.0..600.0).contains(&y));
        }
    }

    #[test]
    fn successive_values_vary() {
        let values: std::collections::HashSet<_> = (0..50).map(|_| random_below(1_000_000)).collect();
        assert!(values.len() > 1);
    }
}
