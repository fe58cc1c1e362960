//! Adaptive Runge–Kutta integration of an [`OdeSystem`] onto a [`TimeGrid`].
//!
//! The solver is the Dormand–Prince 5(4) embedded pair: each step evaluates seven stages, takes
//! the fifth-order solution and uses the difference to the embedded fourth-order solution as the
//! local error estimate. The last stage of an accepted step is the first stage of the next one.
//!
//! Integration proceeds one grid interval at a time and always lands exactly on the next grid
//! point, so the output has one state per grid point and `states[0]` is the initial state
//! bit-for-bit. At every grid point the state is checked:
//! * non-finite values fail the call;
//! * negative overshoot down to `-negative_tolerance * N` is clamped to zero, anything lower fails;
//! * `S + I + R` must stay within `conservation_tolerance * N` of its initial value.
use log::trace;

use crate::error::{IntegrationError, IntegrationErrorKind};
use crate::model::{CompartmentState, OdeSystem};
use crate::numeric::within_fraction;
use crate::result::{SimulationResult, SolverStatistics};
use crate::time_grid::TimeGrid;

// Dormand–Prince 5(4) tableau.
const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// Fifth-order weights minus embedded fourth-order weights.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339_200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// Tolerances and limits for [`integrate`]. Population-relative fields are multiplied by `N`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegratorOptions {
    /// Relative local error tolerance per step.
    pub relative_tolerance: f64,
    /// Absolute local error tolerance per step, as a fraction of `N`.
    pub absolute_tolerance: f64,
    /// First trial step size, in model time units.
    pub initial_step: f64,
    /// Maximum accepted plus rejected steps between two consecutive grid points.
    pub max_steps: usize,
    /// Largest negative overshoot, as a fraction of `N`, that is clamped to zero.
    pub negative_tolerance: f64,
    /// Largest drift of `S + I + R`, as a fraction of `N`.
    pub conservation_tolerance: f64,
}

impl Default for IntegratorOptions {
    fn default() -> Self {
        Self {
            relative_tolerance: 1e-9,
            absolute_tolerance: 1e-12,
            initial_step: 0.1,
            max_steps: 10_000,
            negative_tolerance: 1e-7,
            conservation_tolerance: 1e-6,
        }
    }
}

struct Step {
    state: CompartmentState,
    /// Derivative at `state`, reused as the first stage of the next step.
    last_stage: CompartmentState,
    error: CompartmentState,
}

/// `y + h * Σ wᵢ·kᵢ`
fn combine(y: &CompartmentState, h: f64, terms: &[(f64, &CompartmentState)]) -> CompartmentState {
    let increment = terms
        .iter()
        .fold(CompartmentState::default(), |acc, (weight, k)| {
            acc + **k * *weight
        });
    *y + increment * h
}

fn dormand_prince_step<M: OdeSystem>(
    model: &M,
    y: &CompartmentState,
    k1: &CompartmentState,
    h: f64,
) -> Step {
    let k2 = model.derivative(&combine(y, h, &[(A21, k1)]));
    let k3 = model.derivative(&combine(y, h, &[(A31, k1), (A32, &k2)]));
    let k4 = model.derivative(&combine(y, h, &[(A41, k1), (A42, &k2), (A43, &k3)]));
    let k5 = model.derivative(&combine(
        y,
        h,
        &[(A51, k1), (A52, &k2), (A53, &k3), (A54, &k4)],
    ));
    let k6 = model.derivative(&combine(
        y,
        h,
        &[(A61, k1), (A62, &k2), (A63, &k3), (A64, &k4), (A65, &k5)],
    ));
    let state = combine(
        y,
        h,
        &[(B1, k1), (B3, &k3), (B4, &k4), (B5, &k5), (B6, &k6)],
    );
    let k7 = model.derivative(&state);
    let error = combine(
        &CompartmentState::default(),
        h,
        &[
            (E1, k1),
            (E3, &k3),
            (E4, &k4),
            (E5, &k5),
            (E6, &k6),
            (E7, &k7),
        ],
    );
    Step {
        state,
        last_stage: k7,
        error,
    }
}

/// Root-mean-square of the error scaled by the per-component tolerance. A step is accepted when
/// this is at most 1.
fn error_norm(
    error: &CompartmentState,
    previous: &CompartmentState,
    next: &CompartmentState,
    absolute: f64,
    relative: f64,
) -> f64 {
    let scale = previous
        .abs()
        .zip_with(&next.abs(), f64::max)
        .map(|magnitude| absolute + relative * magnitude);
    let ratios = error.zip_with(&scale, |e, s| e / s).to_array();
    (ratios.iter().map(|r| r * r).sum::<f64>() / 3.0).sqrt()
}

fn step_factor(norm: f64) -> f64 {
    if norm == 0.0 {
        MAX_FACTOR
    } else {
        (SAFETY * norm.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
    }
}

/// Clamps small negative overshoot to zero.
fn settle(
    state: CompartmentState,
    epsilon: f64,
    time: f64,
) -> Result<CompartmentState, IntegrationError> {
    if state.min() < -epsilon {
        return Err(IntegrationError::new(
            IntegrationErrorKind::NegativeCompartment,
            time,
        ));
    }
    Ok(state.map(|value| value.max(0.0)))
}

/// Integrates `model` from `initial` at `grid[0]` over every point of `grid`.
///
/// # Errors
///
/// Returns an [`IntegrationError`] if the solver produces a non-finite value, cannot find a
/// small enough step, exceeds `max_steps` within one interval, or an output state breaks the
/// non-negativity or conservation tolerances. No partial result is returned.
pub fn integrate<M: OdeSystem>(
    model: &M,
    initial: CompartmentState,
    grid: &TimeGrid,
    options: &IntegratorOptions,
) -> Result<SimulationResult, IntegrationError> {
    let population = model.population();
    let absolute = options.absolute_tolerance * population;
    let relative = options.relative_tolerance;
    let epsilon = options.negative_tolerance * population;
    let initial_total = initial.total();

    if !initial.is_finite() {
        return Err(IntegrationError::new(IntegrationErrorKind::NonFinite, grid[0]));
    }

    let mut statistics = SolverStatistics::default();
    let mut states = Vec::with_capacity(grid.len());
    states.push(initial);

    let mut state = initial;
    let mut k1 = model.derivative(&state);
    statistics.evaluations += 1;
    let mut h = options.initial_step;

    for (start, end) in grid.intervals() {
        let mut t = start;
        let mut attempts = 0;

        while t < end {
            if attempts >= options.max_steps {
                return Err(IntegrationError::new(
                    IntegrationErrorKind::MaxStepsExceeded,
                    t,
                ));
            }
            attempts += 1;

            let remaining = end - t;
            let clipped = h >= remaining;
            let h_try = if clipped { remaining } else { h };
            if h_try <= 16.0 * f64::EPSILON * t.abs().max(1.0) && !clipped {
                return Err(IntegrationError::new(
                    IntegrationErrorKind::StepSizeUnderflow,
                    t,
                ));
            }

            let step = dormand_prince_step(model, &state, &k1, h_try);
            statistics.evaluations += 6;
            if !step.state.is_finite() || !step.error.is_finite() || !step.last_stage.is_finite()
            {
                return Err(IntegrationError::new(IntegrationErrorKind::NonFinite, t));
            }

            let norm = error_norm(&step.error, &state, &step.state, absolute, relative);
            if norm <= 1.0 {
                statistics.accepted += 1;
                t = if clipped { end } else { t + h_try };
                state = step.state;
                k1 = step.last_stage;
                let proposal = h_try * step_factor(norm);
                h = if clipped { proposal.max(h) } else { proposal };
            } else {
                statistics.rejected += 1;
                h = h_try * step_factor(norm).min(1.0);
            }
        }

        let settled = settle(state, epsilon, end)?;
        if settled != state {
            state = settled;
            k1 = model.derivative(&state);
            statistics.evaluations += 1;
        }
        if !within_fraction(
            state.total(),
            initial_total,
            options.conservation_tolerance,
            population,
        ) {
            return Err(IntegrationError::new(
                IntegrationErrorKind::ConservationViolated,
                end,
            ));
        }
        states.push(state);
    }

    trace!(
        "integrated {} points: {} accepted steps, {} rejected, {} evaluations",
        grid.len(),
        statistics.accepted,
        statistics.rejected,
        statistics.evaluations
    );
    Ok(SimulationResult::from_states(
        grid.clone(),
        &states,
        population,
        statistics,
    ))
}
