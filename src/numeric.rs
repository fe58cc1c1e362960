//! Floating point comparison helpers, thin wrappers around the `approx` crate.

use approx::{AbsDiffEq, RelativeEq};

/// Default absolute accuracy for comparisons that have no natural scale.
pub const ACC: f64 = 10e-11;

/// Compares two floats with a maximum absolute difference of `acc`.
/// Infinities compare equal only to an infinity of the same sign.
#[must_use]
pub fn almost_eq(a: f64, b: f64, acc: f64) -> bool {
    if a.is_infinite() && b.is_infinite() {
        return a == b;
    }
    a.abs_diff_eq(&b, acc)
}

/// Compares `value` with `target`, allowing an absolute error of `fraction * scale`.
///
/// Conservation and non-negativity checks are phrased this way: "within 1e-6 of N".
#[must_use]
pub fn within_fraction(value: f64, target: f64, fraction: f64, scale: f64) -> bool {
    value.abs_diff_eq(&target, fraction * scale.abs())
}

/// Compares two floats with a relative tolerance of `max_relative`.
#[must_use]
pub fn relative_eq(a: f64, b: f64, max_relative: f64) -> bool {
    a.relative_eq(&b, f64::EPSILON, max_relative)
}
