//! Trajectories produced by the integrator.
use serde::Serialize;

use crate::model::CompartmentState;
use crate::time_grid::TimeGrid;

/// Work done by the solver for one trajectory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SolverStatistics {
    pub accepted: usize,
    pub rejected: usize,
    pub evaluations: usize,
}

/// `S(t)`, `I(t)` and `R(t)` aligned index-for-index with a [`TimeGrid`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    time: TimeGrid,
    susceptible: Vec<f64>,
    infected: Vec<f64>,
    recovered: Vec<f64>,
    population: f64,
    statistics: SolverStatistics,
}

impl SimulationResult {
    /// # Panics
    ///
    /// Panics if there is not exactly one state per grid point.
    #[must_use]
    pub fn from_states(
        time: TimeGrid,
        states: &[CompartmentState],
        population: f64,
        statistics: SolverStatistics,
    ) -> Self {
        assert_eq!(
            states.len(),
            time.len(),
            "a trajectory needs one state per grid point"
        );
        Self {
            time,
            susceptible: states.iter().map(|s| s.susceptible).collect(),
            infected: states.iter().map(|s| s.infected).collect(),
            recovered: states.iter().map(|s| s.recovered).collect(),
            population,
            statistics,
        }
    }

    #[must_use]
    pub fn time(&self) -> &TimeGrid {
        &self.time
    }

    #[must_use]
    pub fn susceptible(&self) -> &[f64] {
        &self.susceptible
    }

    #[must_use]
    pub fn infected(&self) -> &[f64] {
        &self.infected
    }

    #[must_use]
    pub fn recovered(&self) -> &[f64] {
        &self.recovered
    }

    /// The `N` the trajectory was computed with.
    #[must_use]
    pub fn population(&self) -> f64 {
        self.population
    }

    #[must_use]
    pub fn statistics(&self) -> SolverStatistics {
        self.statistics
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn state_at(&self, index: usize) -> CompartmentState {
        CompartmentState::new(
            self.susceptible[index],
            self.infected[index],
            self.recovered[index],
        )
    }

    pub fn states(&self) -> impl Iterator<Item = CompartmentState> + '_ {
        (0..self.len()).map(|index| self.state_at(index))
    }

    /// Largest value of any compartment over the whole trajectory.
    #[must_use]
    pub fn max_value(&self) -> f64 {
        self.states()
            .map(|state| state.max())
            .fold(f64::NEG_INFINITY, f64::max)
    }

    #[must_use]
    pub fn summary(&self) -> TrajectorySummary {
        let (peak_index, peak_infected) = self
            .infected
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (index, value)| {
                if value > best.1 {
                    (index, value)
                } else {
                    best
                }
            });
        let initial = self.state_at(0);
        let final_state = self.state_at(self.len() - 1);
        TrajectorySummary {
            peak_infected,
            peak_time: self.time[peak_index],
            final_state,
            attack_rate: (initial.susceptible - final_state.susceptible) / self.population,
        }
    }
}

/// Headline numbers of one trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrajectorySummary {
    pub peak_infected: f64,
    /// First grid time at which `peak_infected` is reached.
    pub peak_time: f64,
    pub final_state: CompartmentState,
    /// Fraction of `N` infected over the horizon: `(S(0) − S(t_max)) / N`.
    pub attack_rate: f64,
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::assert_almost_eq;

    fn sample() -> SimulationResult {
        let states = [
            CompartmentState::new(90.0, 10.0, 0.0),
            CompartmentState::new(60.0, 30.0, 10.0),
            CompartmentState::new(40.0, 30.0, 30.0),
            CompartmentState::new(35.0, 5.0, 60.0),
        ];
        SimulationResult::from_states(
            TimeGrid::new(3.0, 4),
            &states,
            100.0,
            SolverStatistics::default(),
        )
    }

    #[test]
    fn columns_are_aligned() {
        let result = sample();
        assert_eq!(result.len(), 4);
        assert_eq!(result.susceptible(), &[90.0, 60.0, 40.0, 35.0]);
        assert_eq!(result.infected(), &[10.0, 30.0, 30.0, 5.0]);
        assert_eq!(result.recovered(), &[0.0, 10.0, 30.0, 60.0]);
        assert_eq!(result.state_at(2), CompartmentState::new(40.0, 30.0, 30.0));
        assert_eq!(result.max_value(), 90.0);
    }

    #[test]
    fn summary_reports_first_peak() {
        let summary = sample().summary();
        assert_eq!(summary.peak_infected, 30.0);
        assert_eq!(summary.peak_time, 1.0);
        assert_eq!(summary.final_state, CompartmentState::new(35.0, 5.0, 60.0));
        assert_almost_eq!(summary.attack_rate, 0.55, 1e-12);
    }

    #[test]
    #[should_panic(expected = "one state per grid point")]
    fn misaligned_states_are_rejected() {
        let _ = SimulationResult::from_states(
            TimeGrid::new(3.0, 4),
            &[CompartmentState::default()],
            100.0,
            SolverStatistics::default(),
        );
    }
}
