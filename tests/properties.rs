//! End-to-end checks of trajectory invariants over the whole admissible parameter space.
#![allow(clippy::float_cmp)]

use sir_explorer::controller::{recompute, SimulationOutput};
use sir_explorer::integrator::IntegratorOptions;
use sir_explorer::numeric::{relative_eq, within_fraction};
use sir_explorer::parameters::{ParameterField, ParameterStore, Parameters};
use sir_explorer::time_grid::TimeGrid;

fn parameters(n: f64, i0: f64, r0: f64, beta: f64, gamma: f64) -> Parameters {
    let mut store = ParameterStore::new();
    for (field, value) in [
        (ParameterField::Population, n),
        (ParameterField::InitialInfected, i0),
        (ParameterField::InitialRecovered, r0),
        (ParameterField::InfectionRate, beta),
        (ParameterField::RecoveryRate, gamma),
    ] {
        let _ = store.set(field, value);
    }
    store.get()
}

fn run(parameters: &Parameters, grid: &TimeGrid) -> SimulationOutput {
    recompute(parameters, grid, &IntegratorOptions::default())
        .unwrap_or_else(|e| panic!("{parameters:?} failed: {e}"))
}

/// Corners of the parameter ranges, plus a few values inside them.
fn parameter_sweep() -> Vec<Parameters> {
    let mut sweep = Vec::new();
    for n in [100.0, 1000.0, 5_000_000.0] {
        for i0 in [1.0, 50.0, 1_000_000.0] {
            for r0 in [0.0, 30.0, 500_000.0] {
                for beta in [0.05, 0.4, 1.0] {
                    for gamma in [0.01, 0.1, 1.0] {
                        sweep.push(parameters(n, i0, r0, beta, gamma));
                    }
                }
            }
        }
    }
    sweep
}

#[test]
fn population_is_conserved() {
    let grid = TimeGrid::reference();
    for p in parameter_sweep() {
        let output = run(&p, &grid);
        let initial_total = output.result.state_at(0).total();
        if (p.initial_infected + p.initial_recovered) as f64 <= p.population {
            assert_eq!(initial_total, p.population, "{p:?}");
        }
        for state in output.result.states() {
            assert!(
                within_fraction(state.total(), initial_total, 1e-6, p.population),
                "{p:?}: total {} drifted from {initial_total}",
                state.total()
            );
        }
    }
}

#[test]
fn first_point_is_the_clamped_initial_state() {
    let grid = TimeGrid::reference();
    for p in parameter_sweep() {
        let output = run(&p, &grid);
        assert_eq!(output.result.state_at(0), p.initial_state(), "{p:?}");
        assert_eq!(output.result.time()[0], 0.0);
        assert_eq!(output.result.len(), grid.len());
    }
}

#[test]
fn recovered_never_decreases() {
    let grid = TimeGrid::reference();
    for p in parameter_sweep() {
        let output = run(&p, &grid);
        let tolerance = 1e-9 * p.population;
        for pair in output.result.recovered().windows(2) {
            assert!(pair[1] >= pair[0] - tolerance, "{p:?}: {pair:?}");
        }
    }
}

#[test]
fn compartments_stay_non_negative() {
    let grid = TimeGrid::reference();
    for p in parameter_sweep() {
        let output = run(&p, &grid);
        for state in output.result.states() {
            assert!(state.min() >= 0.0, "{p:?}: {state:?}");
        }
    }
}

#[test]
fn identical_inputs_give_identical_outputs() {
    let grid = TimeGrid::reference();
    let p = parameters(2500.0, 3.0, 10.0, 0.7, 0.15);
    let first = run(&p, &grid);
    let second = run(&p, &grid);
    assert_eq!(first, second);
    for (a, b) in first.result.infected().iter().zip(second.result.infected()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn infeasible_initial_counts_start_with_no_susceptibles() {
    let p = parameters(1000.0, 900.0, 300.0, 0.4, 0.1);
    assert_eq!(p.initial_susceptible(), 0.0);
    let output = run(&p, &TimeGrid::reference());
    let start = output.result.state_at(0);
    assert_eq!(start.susceptible, 0.0);
    assert_eq!(start.infected, 900.0);
    assert_eq!(start.recovered, 300.0);
    // Nobody left to infect.
    assert!(output.result.susceptible().iter().all(|&s| s == 0.0));
}

#[test]
fn default_epidemic_peaks_then_burns_out() {
    // One point per day, 0 through 159.
    let grid = TimeGrid::new(159.0, 160);
    let p = Parameters::default();
    let output = run(&p, &grid);
    let result = &output.result;

    assert_eq!(result.state_at(0).to_array(), [999.0, 1.0, 0.0]);
    let summary = result.summary();
    assert!(summary.peak_infected > 1.0);
    assert!(summary.peak_time > 0.0 && summary.peak_time < 159.0);
    let last_infected = result.infected()[result.len() - 1];
    assert!(last_infected < 1.0);
    assert!(last_infected < summary.peak_infected / 100.0);
    let final_recovered = summary.final_state.recovered;
    assert!(final_recovered > 0.0 && final_recovered < 1000.0);
    assert!(summary.final_state.susceptible > 0.0);
    assert_eq!(output.x_upper_bound, 159.0);
}

#[test]
fn epidemic_never_grows_when_recovery_keeps_up() {
    // gamma >= beta, including the critical case gamma == beta.
    for (beta, gamma) in [(0.1, 0.5), (0.3, 0.3), (1.0, 1.0), (0.05, 0.05)] {
        for (n, i0, r0) in [(1000.0, 1.0, 0.0), (1000.0, 100.0, 200.0), (1e6, 10.0, 0.0)] {
            let p = parameters(n, i0, r0, beta, gamma);
            let output = run(&p, &TimeGrid::reference());
            let tolerance = 1e-9 * p.population;
            for pair in output.result.infected().windows(2) {
                assert!(
                    pair[1] <= pair[0] + tolerance,
                    "beta={beta} gamma={gamma} N={n}: {pair:?}"
                );
            }
        }
    }
}

#[test]
fn y_bound_leaves_headroom_above_population() {
    for p in parameter_sweep() {
        let output = run(&p, &TimeGrid::reference());
        let tallest = output.result.max_value().max(p.population);
        assert!(relative_eq(output.y_upper_bound, 1.1 * tallest, 1e-12));
        assert_eq!(output.x_upper_bound, 160.0);
    }
}
