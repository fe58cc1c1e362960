//! An interactive SIR epidemic explorer, run headless.
//!
//! The population is split into susceptible, infected and recovered compartments whose sizes
//! follow
//!
//! ```text
//! dS/dt = -β·S·I/N
//! dI/dt =  β·S·I/N - γ·I
//! dR/dt =  γ·I
//! ```
//!
//! Five parameters (`N`, `I0`, `R0`, `β`, `γ`) live in a clamping parameter store. Every
//! effective change is announced as a [`ParameterChangeEvent`](parameters::ParameterChangeEvent);
//! the recompute controller answers by integrating the model over a fixed time grid with an
//! adaptive Dormand–Prince solver and handing the trajectory, or the reason it failed, to every
//! registered view.
//!
//! Everything runs on a single-threaded [`Context`](context::Context):
//! * parameter changes can happen immediately or be scheduled as plans at a simulated time
//! * event handlers and recomputes run as queued callbacks, in order
//! * module state is kept in data plugins
//!
//! A minimal session:
//!
//! ```rust
//! use sir_explorer::prelude::*;
//!
//! let mut context = Context::new();
//! context.add_view(|_, update| {
//!     let output = update.outcome.as_ref().unwrap();
//!     info!("peak infected {}", output.result.summary().peak_infected);
//! });
//! context.init_recompute_controller();
//! context.schedule_parameter_change(1.0, ParameterField::InfectionRate, 0.3);
//! context.execute();
//! assert_eq!(context.recompute_statistics().recomputes, 2);
//! ```
pub mod context;
pub mod controller;
pub mod error;
pub mod execution_stats;
pub mod hashing;
pub mod integrator;
pub mod log;
pub mod macros;
pub mod model;
pub mod numeric;
pub mod parameters;
pub mod plan;
pub mod prelude;
pub mod report;
pub mod result;
pub mod runner;
pub mod time_grid;

// Used by `define_report!` in downstream crates.
pub use csv;

pub use context::Context;
pub use error::{IntegrationError, SirError};
pub use crate::log::{debug, error, info, trace, warn};
