pub use crate::context::{Context, Event};
pub use crate::controller::{ContextRecomputeExt, SimulationOutput, ViewUpdate};
pub use crate::error::{IntegrationError, IntegrationErrorKind, SirError};
pub use crate::log::{debug, error, info, trace, warn};
pub use crate::parameters::{
    ContextParametersExt, ParameterChangeEvent, ParameterField, Parameters,
};
pub use crate::report::ContextReportExt;
pub use crate::time_grid::TimeGrid;
pub use crate::{assert_almost_eq, define_data_plugin, define_report};
