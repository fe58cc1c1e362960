//! Evenly spaced output times.
use std::ops::Index;
use std::rc::Rc;

/// Horizon of the reference configuration, in days.
pub const DEFAULT_T_MAX: f64 = 160.0;
/// Number of output points of the reference configuration.
pub const DEFAULT_GRID_POINTS: usize = 160;

/// An immutable, strictly increasing sequence of times from `0` to `t_max` inclusive.
///
/// Points are `t_max * k / (n - 1)` for `k = 0..n`, so the first point is exactly `0.0` and the
/// last is exactly `t_max`. The points are shared, so cloning a grid is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    points: Rc<[f64]>,
}

impl TimeGrid {
    /// # Panics
    ///
    /// Panics if `points < 2` or `t_max` is not strictly positive and finite.
    #[must_use]
    pub fn new(t_max: f64, points: usize) -> Self {
        assert!(points >= 2, "a time grid needs at least two points");
        assert!(
            t_max.is_finite() && t_max > 0.0,
            "time grid horizon must be positive, got {t_max}"
        );
        let last = (points - 1) as f64;
        let points: Vec<f64> = (0..points)
            .map(|k| {
                if k == points - 1 {
                    t_max
                } else {
                    t_max * (k as f64) / last
                }
            })
            .collect();
        Self {
            points: points.into(),
        }
    }

    /// Wraps explicit points.
    ///
    /// # Panics
    ///
    /// Panics unless there are at least two points, the first is `0.0`, and they strictly
    /// increase.
    #[must_use]
    pub fn from_points(points: Vec<f64>) -> Self {
        assert!(points.len() >= 2, "a time grid needs at least two points");
        assert!(points[0] == 0.0, "a time grid must start at 0");
        assert!(
            points.windows(2).all(|pair| pair[1] > pair[0]),
            "time grid points must be strictly increasing"
        );
        Self {
            points: points.into(),
        }
    }

    /// 160 points spanning `[0, 160]` days.
    #[must_use]
    pub fn reference() -> Self {
        Self::new(DEFAULT_T_MAX, DEFAULT_GRID_POINTS)
    }

    #[must_use]
    pub fn t_max(&self) -> f64 {
        self.points[self.points.len() - 1]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false: a grid has at least two points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().copied()
    }

    /// Consecutive `(start, end)` pairs.
    pub fn intervals(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points.windows(2).map(|pair| (pair[0], pair[1]))
    }
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self::reference()
    }
}

impl Index<usize> for TimeGrid {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.points[index]
    }
}
