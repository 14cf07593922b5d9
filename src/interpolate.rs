//! Piecewise-linear curves for reservoir level lookups.
//!
//! Each hydropower station carries two sampled curves: forebay level as a function of reservoir
//! volume and tailrace level as a function of discharge. Heads are recomputed from these curves
//! between solves, so lookups must be defined for any query value: queries outside the sampled
//! range are extrapolated linearly from the nearest segment.
use anyhow::{ensure, Result};

/// A piecewise-linear curve sampled at strictly increasing abscissae
#[derive(Clone, Debug, PartialEq)]
pub struct LevelCurve {
    points: Vec<(f64, f64)>,
}

impl LevelCurve {
    /// Create a curve from sample points.
    ///
    /// Points are sorted by abscissa. A single-point curve is allowed and evaluates as a
    /// constant; duplicate abscissae are an error.
    pub fn new(mut points: Vec<(f64, f64)>) -> Result<Self> {
        ensure!(!points.is_empty(), "Curve must have at least one point");
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        ensure!(
            points.windows(2).all(|w| w[0].0 < w[1].0),
            "Curve abscissae must be distinct"
        );

        Ok(Self { points })
    }

    /// Evaluate the curve at `x`, extrapolating beyond the sampled range
    pub fn value_at(&self, x: f64) -> f64 {
        let points = &self.points;
        if points.len() == 1 {
            return points[0].1;
        }

        // Pick the segment containing x, or the outermost segment for extrapolation
        let last = points.len() - 2;
        let i = points[1..last + 1]
            .iter()
            .position(|&(px, _)| x < px)
            .unwrap_or(last);

        let (x0, y0) = points[i];
        let (x1, y1) = points[i + 1];
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 10.0)] // below range: extrapolated from first segment
    #[case(1.0, 12.0)]
    #[case(1.5, 13.0)] // interior interpolation
    #[case(2.0, 14.0)]
    #[case(3.0, 20.0)]
    #[case(4.0, 26.0)] // above range: extrapolated from last segment
    fn test_value_at(#[case] x: f64, #[case] expected: f64) {
        let curve = LevelCurve::new(vec![(1.0, 12.0), (2.0, 14.0), (3.0, 20.0)]).unwrap();
        assert_approx_eq!(f64, curve.value_at(x), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_single_point_is_constant() {
        let curve = LevelCurve::new(vec![(5.0, 42.0)]).unwrap();
        assert_approx_eq!(f64, curve.value_at(-100.0), 42.0);
        assert_approx_eq!(f64, curve.value_at(100.0), 42.0);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let curve = LevelCurve::new(vec![(3.0, 20.0), (1.0, 12.0), (2.0, 14.0)]).unwrap();
        assert_approx_eq!(f64, curve.value_at(1.5), 13.0);
    }

    #[test]
    fn test_invalid_curves() {
        assert!(LevelCurve::new(vec![]).is_err());
        assert!(LevelCurve::new(vec![(1.0, 2.0), (1.0, 3.0)]).is_err());
    }
}
