use log::warn;

/// Give up shrinking after this many rounds and fall back to a flat rate.
const MAX_SHRINK_ROUNDS: usize = 10_000;

/// Spread a population-level `rate` across age groups by relative risk while
/// keeping the population-weighted mean equal to `rate`.
///
/// `adjustment[a]` is the relative deviation of age group `a` (0 = average
/// risk, -1 = no risk) and `weights` the population share of each group
/// (summing to 1). Output for group `a` is `rate * (1 + adjustment[a]) * c`
/// with `c = 1 / Σ weights * (1 + adjustment)`.
///
/// If any output would reach `max_rate`, the spread of `adjustment` around
/// its mean is shrunk by 10% in variance and the computation retried.
pub fn adjust_rate_by_age(rate: f64, adjustment: &[f64], weights: &[f64], max_rate: f64) -> Vec<f64> {
    let n = adjustment.len();
    if rate == 0.0 {
        return vec![0.0; n];
    }
    if rate >= max_rate {
        warn!(
            "rate {} is at or above the ceiling {}, using it unadjusted for every age group",
            rate, max_rate
        );
        return vec![rate; n];
    }

    let mut adj = adjustment.to_vec();
    for _ in 0..MAX_SHRINK_ROUNDS {
        let denom: f64 = weights.iter().zip(&adj).map(|(w, a)| w * (1.0 + a)).sum();
        if denom <= 0.0 || !denom.is_finite() {
            warn!("age adjustment has no weighted mass (Σw(1+a) = {}), using flat rate {}", denom, rate);
            return vec![rate; n];
        }
        let out: Vec<f64> = adj.iter().map(|a| rate * (1.0 + a) / denom).collect();
        if out.iter().all(|r| *r < max_rate) {
            return out;
        }

        warn!(
            "age-adjusted rate reached the ceiling {}, reducing adjustment variance by 10%",
            max_rate
        );
        let mean = adj.iter().sum::<f64>() / n as f64;
        let shrink = 0.9f64.sqrt();
        for a in adj.iter_mut() {
            *a = mean + shrink * (*a - mean);
        }
    }

    warn!("age adjustment did not settle under the ceiling {}, using flat rate {}", max_rate, rate);
    vec![rate; n]
}

/// Relative deviation of each entry from the unweighted mean: `x / mean(x) - 1`.
pub fn relative_to_mean(values: &[f64]) -> Vec<f64> {
    let mean = values.iter().sum::<f64>() / values.len().max(1) as f64;
    if mean == 0.0 || !mean.is_finite() {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| v / mean - 1.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn weighted_mean(w: &[f64], x: &[f64]) -> f64 {
        w.iter().zip(x).map(|(a, b)| a * b).sum()
    }

    #[test]
    fn zero_rate_stays_zero() {
        assert_eq!(adjust_rate_by_age(0.0, &[0.5, -0.5], &[0.5, 0.5], 1e20), vec![0.0, 0.0]);
    }

    #[test]
    fn flat_adjustment_returns_nominal_rate() {
        let out = adjust_rate_by_age(0.2, &[0.0; 3], &[0.2, 0.3, 0.5], 1e20);
        for r in out {
            assert!((r - 0.2).abs() < 1e-15);
        }
    }

    #[test]
    fn rate_at_ceiling_is_flat() {
        let out = adjust_rate_by_age(2.0, &[1.0, -0.5], &[0.5, 0.5], 1.0);
        assert_eq!(out, vec![2.0, 2.0]);
    }

    #[test]
    fn ceiling_shrinks_spread_and_keeps_mean() {
        let w = [0.5, 0.5];
        let out = adjust_rate_by_age(0.5, &[3.0, -0.9], &w, 0.8);
        assert!(out.iter().all(|r| *r < 0.8));
        assert!((weighted_mean(&w, &out) - 0.5).abs() < 1e-12);
        assert!(out[0] > out[1]);
    }

    #[test]
    fn relative_to_mean_centres_on_zero() {
        let rel = relative_to_mean(&[1.0, 2.0, 3.0]);
        assert_eq!(rel, vec![-0.5, 0.0, 0.5]);
        assert_eq!(relative_to_mean(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    proptest! {
        #[test]
        fn weighted_mean_is_preserved(
            rate in 1e-6f64..10.0,
            raw in prop::collection::vec((0.01f64..1.0, -0.9f64..3.0), 1..12),
        ) {
            let total: f64 = raw.iter().map(|(w, _)| w).sum();
            let weights: Vec<f64> = raw.iter().map(|(w, _)| w / total).collect();
            let adjustment: Vec<f64> = raw.iter().map(|(_, a)| *a).collect();
            let out = adjust_rate_by_age(rate, &adjustment, &weights, 1e20);
            prop_assert!((weighted_mean(&weights, &out) - rate).abs() <= 1e-9 * rate.max(1.0));
            prop_assert!(out.iter().all(|r| *r >= 0.0));
        }
    }
}
