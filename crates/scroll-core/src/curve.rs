//! Non-linear rate-to-scale dampening.

/// Map an input rate (events/sec) to an impulse scale in `[min_scale, 1.0]`.
///
/// At or below `low` input passes through unscaled; at or above `high` the
/// scale bottoms out at `min_scale`. In between the scale follows
/// `1 - (1 - min_scale) * sqrt(t)`, which drops steeply just above `low`
/// and flattens towards `high`.
///
/// Expects `low < high` and `min_scale` in `[0, 1]`.
pub fn dampening_scale(rate: f64, low: f64, high: f64, min_scale: f64) -> f64 {
    if rate <= low {
        return 1.0;
    }
    if rate >= high {
        return min_scale;
    }

    let t = (rate - low) / (high - low);
    1.0 - (1.0 - min_scale) * t.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_regions() {
        assert_eq!(dampening_scale(0.0, 5.0, 30.0, 0.3), 1.0);
        assert_eq!(dampening_scale(5.0, 5.0, 30.0, 0.3), 1.0);
        assert_eq!(dampening_scale(30.0, 5.0, 30.0, 0.3), 0.3);
        assert_eq!(dampening_scale(40.0, 5.0, 30.0, 0.3), 0.3);
    }

    #[test]
    fn test_concave_midpoint() {
        // A quarter of the way up already removes half the dampening range.
        let scale = dampening_scale(11.25, 5.0, 30.0, 0.3);
        assert!((scale - 0.65).abs() < 1e-12, "scale={scale}");
    }

    proptest! {
        #[test]
        fn prop_scale_is_monotonic(
            low in 0.0f64..100.0,
            span in 0.1f64..200.0,
            min_scale in 0.0f64..=1.0,
            r1 in 0.0f64..500.0,
            r2 in 0.0f64..500.0,
        ) {
            let high = low + span;
            let (lo_r, hi_r) = if r1 <= r2 { (r1, r2) } else { (r2, r1) };
            prop_assert!(
                dampening_scale(lo_r, low, high, min_scale)
                    >= dampening_scale(hi_r, low, high, min_scale)
            );
        }

        #[test]
        fn prop_scale_is_bounded(
            low in 0.0f64..100.0,
            span in 0.1f64..200.0,
            min_scale in 0.0f64..=1.0,
            rate in 0.0f64..1_000.0,
        ) {
            let scale = dampening_scale(rate, low, low + span, min_scale);
            prop_assert!(scale >= min_scale - 1e-12);
            prop_assert!(scale <= 1.0);
        }
    }
}
