//! The SIR compartmental model.
//!
//! A closed population of `N` people moves from Susceptible to Infected at rate `β·S·I/N` and
//! from Infected to Recovered at rate `γ·I`:
//!
//! ```text
//! dS/dt = −β·S·I/N
//! dI/dt =  β·S·I/N − γ·I
//! dR/dt =  γ·I
//! ```
//!
//! The three rates sum to zero, so `S + I + R` is an invariant of the exact solution. `N` is
//! supplied by the caller rather than re-derived from the state.
use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// Counts of people in each compartment at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CompartmentState {
    pub susceptible: f64,
    pub infected: f64,
    pub recovered: f64,
}

impl CompartmentState {
    #[must_use]
    pub fn new(susceptible: f64, infected: f64, recovered: f64) -> Self {
        Self {
            susceptible,
            infected,
            recovered,
        }
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.susceptible + self.infected + self.recovered
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.susceptible.is_finite() && self.infected.is_finite() && self.recovered.is_finite()
    }

    /// Largest compartment.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.susceptible.max(self.infected).max(self.recovered)
    }

    /// Smallest compartment.
    #[must_use]
    pub fn min(&self) -> f64 {
        self.susceptible.min(self.infected).min(self.recovered)
    }

    #[must_use]
    pub fn abs(&self) -> Self {
        Self::new(
            self.susceptible.abs(),
            self.infected.abs(),
            self.recovered.abs(),
        )
    }

    /// Applies `f` to each compartment.
    #[must_use]
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self::new(f(self.susceptible), f(self.infected), f(self.recovered))
    }

    /// Combines two states compartment by compartment.
    #[must_use]
    pub fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        Self::new(
            f(self.susceptible, other.susceptible),
            f(self.infected, other.infected),
            f(self.recovered, other.recovered),
        )
    }

    #[must_use]
    pub fn to_array(&self) -> [f64; 3] {
        [self.susceptible, self.infected, self.recovered]
    }
}

impl Add for CompartmentState {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.zip_with(&rhs, |a, b| a + b)
    }
}

impl Sub for CompartmentState {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.zip_with(&rhs, |a, b| a - b)
    }
}

impl Mul<f64> for CompartmentState {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        self.map(|a| a * rhs)
    }
}

/// A first-order autonomous ODE over `CompartmentState`.
pub trait OdeSystem {
    /// Instantaneous rate of change at `state`.
    fn derivative(&self, state: &CompartmentState) -> CompartmentState;

    /// Total population the state must conserve.
    fn population(&self) -> f64;
}

/// The SIR equations for a fixed population and fixed rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SirModel {
    population: f64,
    infection_rate: f64,
    recovery_rate: f64,
}

impl SirModel {
    /// # Panics
    ///
    /// Panics if `population` is not strictly positive and finite; the equations divide by it.
    #[must_use]
    pub fn new(population: f64, infection_rate: f64, recovery_rate: f64) -> Self {
        assert!(
            population.is_finite() && population > 0.0,
            "population must be positive, got {population}"
        );
        Self {
            population,
            infection_rate,
            recovery_rate,
        }
    }

    #[must_use]
    pub fn infection_rate(&self) -> f64 {
        self.infection_rate
    }

    #[must_use]
    pub fn recovery_rate(&self) -> f64 {
        self.recovery_rate
    }

    /// R0 = β/γ.
    #[must_use]
    pub fn basic_reproduction_number(&self) -> f64 {
        basic_reproduction_number(self.infection_rate, self.recovery_rate)
    }
}

impl OdeSystem for SirModel {
    fn derivative(&self, state: &CompartmentState) -> CompartmentState {
        let new_infections =
            self.infection_rate * state.susceptible * state.infected / self.population;
        let new_recoveries = self.recovery_rate * state.infected;
        CompartmentState::new(
            -new_infections,
            new_infections - new_recoveries,
            new_recoveries,
        )
    }

    fn population(&self) -> f64 {
        self.population
    }
}

/// R0 = β/γ, the expected number of secondary infections in a fully susceptible population.
#[must_use]
pub fn basic_reproduction_number(infection_rate: f64, recovery_rate: f64) -> f64 {
    infection_rate / recovery_rate
}

/// Fraction of the population that must be immune for infections to decline: 1 − 1/R0, or 0
/// when R0 ≤ 1.
#[must_use]
pub fn herd_immunity_threshold(infection_rate: f64, recovery_rate: f64) -> f64 {
    let r0 = basic_reproduction_number(infection_rate, recovery_rate);
    if r0 <= 1.0 {
        0.0
    } else {
        1.0 - 1.0 / r0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_almost_eq;

    #[test]
    fn derivative_matches_equations() {
        let model = SirModel::new(1000.0, 0.4, 0.1);
        let rate = model.derivative(&CompartmentState::new(999.0, 1.0, 0.0));
        assert_almost_eq!(rate.susceptible, -0.3996, 1e-12);
        assert_almost_eq!(rate.infected, 0.2996, 1e-12);
        assert_almost_eq!(rate.recovered, 0.1, 1e-12);
    }

    #[test]
    fn derivative_sums_to_zero() {
        let model = SirModel::new(5_000_000.0, 0.93, 0.07);
        let state = CompartmentState::new(3_000_000.0, 1_500_000.0, 500_000.0);
        assert_almost_eq!(model.derivative(&state).total(), 0.0, 1e-6);
    }

    #[test]
    fn no_infected_means_no_change() {
        let model = SirModel::new(1000.0, 0.4, 0.1);
        let rate = model.derivative(&CompartmentState::new(1000.0, 0.0, 0.0));
        assert_eq!(rate, CompartmentState::default());
    }

    #[test]
    fn population_is_a_parameter_not_the_state_total() {
        // S + I + R = 500 here, but the model divides by the N it was given.
        let model = SirModel::new(1000.0, 0.5, 0.1);
        let rate = model.derivative(&CompartmentState::new(400.0, 100.0, 0.0));
        assert_almost_eq!(rate.susceptible, -20.0, 1e-12);
        assert_eq!(model.population(), 1000.0);
    }

    #[test]
    #[should_panic(expected = "population must be positive")]
    fn zero_population_is_rejected() {
        let _ = SirModel::new(0.0, 0.4, 0.1);
    }

    #[test]
    fn reproduction_number_and_threshold() {
        assert_almost_eq!(basic_reproduction_number(0.4, 0.1), 4.0, 1e-12);
        assert_almost_eq!(herd_immunity_threshold(0.4, 0.1), 0.75, 1e-12);
        assert_eq!(herd_immunity_threshold(0.1, 0.5), 0.0);
        assert_almost_eq!(
            SirModel::new(100.0, 0.3, 0.1).basic_reproduction_number(),
            3.0,
            1e-12
        );
    }

    #[test]
    fn state_arithmetic() {
        let a = CompartmentState::new(1.0, 2.0, 3.0);
        let b = CompartmentState::new(0.5, 0.5, 0.5);
        assert_eq!(a + b, CompartmentState::new(1.5, 2.5, 3.5));
        assert_eq!(a - b, CompartmentState::new(0.5, 1.5, 2.5));
        assert_eq!(a * 2.0, CompartmentState::new(2.0, 4.0, 6.0));
        assert_eq!(a.max(), 3.0);
        assert_eq!((b - a).min(), -2.5);
        assert_eq!((b - a).abs(), CompartmentState::new(0.5, 1.5, 2.5));
        assert!(!CompartmentState::new(f64::NAN, 0.0, 0.0).is_finite());
    }
}
