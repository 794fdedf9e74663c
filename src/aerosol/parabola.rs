/// Abscissa of the minimum of the parabola through three `(x, residual)`
/// points, given in the order they were visited by the descent (oldest
/// first). Returns `None` when the bracket is degenerate: collinear or
/// duplicated points make `xa - xb` vanish, and non-finite input cannot be
/// fitted.
pub fn parabolic_minimum(p2: (f64, f64), p1: (f64, f64), p0: (f64, f64)) -> Option<f64> {
    let (raot2, residual2) = p2;
    let (raot1, residual1) = p1;
    let (raot, residual) = p0;

    let xa = (residual1 - residual) * (raot2 - raot);
    let xb = (residual2 - residual) * (raot1 - raot);
    let denom = xa - xb;
    if !denom.is_finite() || denom == 0.0 {
        return None;
    }

    let xmin = 0.5 * (xa * (raot2 + raot) - xb * (raot1 + raot)) / denom;
    xmin.is_finite().then_some(xmin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_analytic_minimum_of_quadratic() {
        // r(x) = (x - 0.7)^2 + 0.2, sampled at three unevenly spaced points.
        let r = |x: f64| (x - 0.7).powi(2) + 0.2;
        for xs in [[0.2, 0.6, 1.1], [0.1, 0.3, 0.4], [0.5, 2.0, 4.0]] {
            let xmin = parabolic_minimum((xs[0], r(xs[0])), (xs[1], r(xs[1])), (xs[2], r(xs[2])))
                .expect("non-degenerate bracket");
            assert!((xmin - 0.7).abs() < 1e-10, "xmin = {}", xmin);
        }
    }

    #[test]
    fn test_flat_bottom_is_rejected() {
        // Identical residuals: xa and xb both vanish.
        let out = parabolic_minimum((0.2, 0.5), (0.4, 0.5), (0.6, 0.5));
        assert!(out.is_none());
    }

    #[test]
    fn test_duplicate_abscissa_is_rejected() {
        let out = parabolic_minimum((0.4, 0.6), (0.4, 0.5), (0.4, 0.7));
        assert!(out.is_none());
    }

    #[test]
    fn test_non_finite_input_is_rejected() {
        assert!(parabolic_minimum((0.2, f64::NAN), (0.4, 0.5), (0.6, 0.6)).is_none());
        assert!(parabolic_minimum((0.2, 0.9), (0.4, f64::INFINITY), (0.6, 0.6)).is_none());
    }
}
