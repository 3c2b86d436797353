/// Scalar curves used by the time-varying rate builders.

/// Logistic sigmoid `1 / (1 + e^-x)`.
pub fn expit(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Gamma density shape without the normalising constant:
/// `x^(shape-1) * exp(-x / scale)` for `x >= 0`, zero otherwise.
///
/// Callers normalise by the curve maximum, so the constant never matters.
pub fn gamma_kernel(x: f64, shape: f64, scale: f64) -> f64 {
    if x < 0.0 || scale <= 0.0 {
        return 0.0;
    }
    if x == 0.0 {
        return if shape < 1.0 {
            f64::INFINITY
        } else if shape == 1.0 {
            1.0
        } else {
            0.0
        };
    }
    ((shape - 1.0) * x.ln() - x / scale).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expit_is_symmetric_and_stable() {
        assert!((expit(0.0) - 0.5).abs() < 1e-15);
        assert!((expit(3.0) + expit(-3.0) - 1.0).abs() < 1e-12);
        assert_eq!(expit(-1000.0), 0.0);
        assert_eq!(expit(1000.0), 1.0);
    }

    #[test]
    fn gamma_kernel_peaks_at_mode() {
        // mode = (shape - 1) * scale
        let (shape, scale) = (2.0, 10.0);
        let at_mode = gamma_kernel(10.0, shape, scale);
        assert!(at_mode > gamma_kernel(9.0, shape, scale));
        assert!(at_mode > gamma_kernel(11.0, shape, scale));
        assert_eq!(gamma_kernel(0.0, shape, scale), 0.0);
    }
}
