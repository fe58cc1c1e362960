//! The recompute controller ties parameter changes to fresh trajectories.
//!
//! Each recompute reads one snapshot of the parameters, derives the initial state, integrates the
//! SIR model over the time grid and hands the outcome to every registered view. A failed
//! integration is delivered to the views as an error; nothing stale is re-sent.
//!
//! The controller is either `Idle` or `Computing`. A request that arrives while a recompute is
//! in flight (a view asking for another pass, for instance) only sets a pending flag; once the
//! views have been served, one more pass runs with the latest parameters. Requests for a store
//! revision that has already been delivered are dropped, so a burst of changes costs one
//! recompute.
use std::rc::Rc;
use std::time::Instant;

use log::{debug, error, trace};

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::IntegrationError;
use crate::execution_stats::RecomputeStatistics;
use crate::integrator::{integrate, IntegratorOptions};
use crate::parameters::{ContextParametersExt, ParameterChangeEvent, Parameters};
use crate::result::SimulationResult;
use crate::time_grid::TimeGrid;

/// Headroom above the tallest curve when sizing the y axis.
pub const Y_AXIS_HEADROOM: f64 = 1.1;

/// A trajectory and the axis bounds a view needs to draw it.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutput {
    pub result: SimulationResult,
    /// `t_max`
    pub x_upper_bound: f64,
    /// `1.1 × max(N, max(S, I, R))`
    pub y_upper_bound: f64,
}

impl SimulationOutput {
    #[must_use]
    pub fn time(&self) -> &TimeGrid {
        self.result.time()
    }
}

/// What a view receives after every recompute.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewUpdate {
    /// 1 for the first recompute, then counting up.
    pub sequence: usize,
    /// Parameter store revision the snapshot was taken at.
    pub revision: u64,
    pub parameters: Parameters,
    pub outcome: Result<SimulationOutput, IntegrationError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Computing,
}

/// `1.1 × max(N, largest compartment value)`.
#[must_use]
pub fn y_upper_bound(result: &SimulationResult) -> f64 {
    Y_AXIS_HEADROOM * result.population().max(result.max_value())
}

/// Runs one recompute for `parameters` without touching any shared state.
///
/// # Errors
///
/// Returns the integrator's error if the trajectory could not be computed.
pub fn recompute(
    parameters: &Parameters,
    grid: &TimeGrid,
    options: &IntegratorOptions,
) -> Result<SimulationOutput, IntegrationError> {
    let model = parameters.model();
    let initial = parameters.initial_state();
    let result = integrate(&model, initial, grid, options)?;
    let y_upper_bound = y_upper_bound(&result);
    Ok(SimulationOutput {
        result,
        x_upper_bound: grid.t_max(),
        y_upper_bound,
    })
}

type View = dyn Fn(&mut Context, &ViewUpdate);

struct ControllerData {
    state: ControllerState,
    pending: bool,
    initialized: bool,
    rendered_revision: Option<u64>,
    grid: TimeGrid,
    options: IntegratorOptions,
    views: Vec<Rc<View>>,
    statistics: RecomputeStatistics,
}

define_data_plugin!(
    ControllerPlugin,
    ControllerData,
    ControllerData {
        state: ControllerState::Idle,
        pending: false,
        initialized: false,
        rendered_revision: None,
        grid: TimeGrid::reference(),
        options: IntegratorOptions::default(),
        views: Vec::new(),
        statistics: RecomputeStatistics::default(),
    }
);

pub trait ContextRecomputeExt {
    /// Subscribes the controller to parameter changes and queues the initial recompute.
    /// Calling it again has no effect.
    fn init_recompute_controller(&mut self);

    /// Registers a view. Views are called in registration order after every recompute.
    fn add_view(&mut self, view: impl Fn(&mut Context, &ViewUpdate) + 'static);

    /// Replaces the output grid. The next request recomputes even if the parameters are
    /// unchanged.
    fn set_time_grid(&mut self, grid: TimeGrid);

    fn set_integrator_options(&mut self, options: IntegratorOptions);

    #[must_use]
    fn time_grid(&self) -> TimeGrid;

    /// Recomputes now if idle, or marks a pass as pending if a recompute is in flight.
    fn request_recompute(&mut self);

    #[must_use]
    fn controller_state(&self) -> ControllerState;

    #[must_use]
    fn recompute_statistics(&self) -> RecomputeStatistics;
}

impl ContextRecomputeExt for Context {
    fn init_recompute_controller(&mut self) {
        let data = self.get_data_mut(ControllerPlugin);
        if data.initialized {
            return;
        }
        data.initialized = true;
        self.subscribe_to_event(|context, _event: ParameterChangeEvent| {
            context.request_recompute();
        });
        self.queue_callback(Context::request_recompute);
    }

    fn add_view(&mut self, view: impl Fn(&mut Context, &ViewUpdate) + 'static) {
        self.get_data_mut(ControllerPlugin).views.push(Rc::new(view));
    }

    fn set_time_grid(&mut self, grid: TimeGrid) {
        let data = self.get_data_mut(ControllerPlugin);
        data.grid = grid;
        data.rendered_revision = None;
    }

    fn set_integrator_options(&mut self, options: IntegratorOptions) {
        let data = self.get_data_mut(ControllerPlugin);
        data.options = options;
        data.rendered_revision = None;
    }

    fn time_grid(&self) -> TimeGrid {
        self.get_data(ControllerPlugin)
            .map_or_else(TimeGrid::reference, |data| data.grid.clone())
    }

    fn request_recompute(&mut self) {
        let data = self.get_data_mut(ControllerPlugin);
        if data.state == ControllerState::Computing {
            trace!("recompute requested while computing, deferring");
            data.pending = true;
            return;
        }

        loop {
            let revision = self.parameter_revision();
            let parameters = self.get_parameters();
            let data = self.get_data_mut(ControllerPlugin);
            data.pending = false;
            if data.rendered_revision == Some(revision) {
                trace!("revision {revision} already delivered");
                break;
            }
            data.state = ControllerState::Computing;
            let grid = data.grid.clone();
            let options = data.options;

            debug!("recomputing revision {revision}: {parameters:?}");
            let started = Instant::now();
            let outcome = recompute(&parameters, &grid, &options);
            let elapsed = started.elapsed();

            let data = self.get_data_mut(ControllerPlugin);
            data.statistics.record(elapsed, outcome.is_ok());
            data.rendered_revision = Some(revision);
            let sequence = data.statistics.recomputes;
            let views = data.views.clone();
            match &outcome {
                Ok(output) => debug!(
                    "recompute {sequence} finished in {elapsed:?} ({} solver steps), y bound {}",
                    output.result.statistics().accepted,
                    output.y_upper_bound
                ),
                Err(err) => error!("recompute {sequence} for {parameters:?} failed: {err}"),
            }

            let update = ViewUpdate {
                sequence,
                revision,
                parameters,
                outcome,
            };
            for view in views {
                view(self, &update);
            }

            let data = self.get_data_mut(ControllerPlugin);
            data.state = ControllerState::Idle;
            if !data.pending {
                break;
            }
        }
    }

    fn controller_state(&self) -> ControllerState {
        self.get_data(ControllerPlugin)
            .map_or(ControllerState::Idle, |data| data.state)
    }

    fn recompute_statistics(&self) -> RecomputeStatistics {
        self.get_data(ControllerPlugin)
            .map(|data| data.statistics)
            .unwrap_or_default()
    }
}
