use std::fmt::{self, Debug, Display};
use std::io;

/// Failure of the numerical solver for one recompute.
///
/// This is the only error the recompute path produces. It never escapes the
/// controller as a panic: the controller hands it to the registered views in
/// place of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegrationError {
    pub kind: IntegrationErrorKind,
    /// Model time at which the solver gave up.
    pub time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationErrorKind {
    /// A derivative or state component became NaN or infinite.
    NonFinite,
    /// The adaptive step shrank below the representable resolution at `time`.
    StepSizeUnderflow,
    /// More steps than `IntegratorOptions::max_steps` were needed between two grid points.
    MaxStepsExceeded,
    /// A compartment went below the negative-overshoot tolerance.
    NegativeCompartment,
    /// `S + I + R` drifted away from `N` by more than the conservation tolerance.
    ConservationViolated,
}

impl IntegrationError {
    #[must_use]
    pub fn new(kind: IntegrationErrorKind, time: f64) -> Self {
        Self { kind, time }
    }
}

impl Display for IntegrationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let reason = match self.kind {
            IntegrationErrorKind::NonFinite => "solver produced a non-finite value",
            IntegrationErrorKind::StepSizeUnderflow => "step size underflow",
            IntegrationErrorKind::MaxStepsExceeded => "maximum number of steps exceeded",
            IntegrationErrorKind::NegativeCompartment => "a compartment became negative",
            IntegrationErrorKind::ConservationViolated => "population is not conserved",
        };
        write!(f, "simulation failed at t = {}: {reason}", self.time)
    }
}

impl std::error::Error for IntegrationError {}

/// Provides `SirError` and maps other errors to it.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum SirError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    IntegrationError(IntegrationError),
    UnknownParameter(String),
    InvalidParameterValue { field: String, value: String },
    ReportError(String),
    SirError(String),
}

impl From<io::Error> for SirError {
    fn from(error: io::Error) -> Self {
        SirError::IoError(error)
    }
}

impl From<serde_json::Error> for SirError {
    fn from(error: serde_json::Error) -> Self {
        SirError::JsonError(error)
    }
}

impl From<csv::Error> for SirError {
    fn from(error: csv::Error) -> Self {
        SirError::CsvError(error)
    }
}

impl From<IntegrationError> for SirError {
    fn from(error: IntegrationError) -> Self {
        SirError::IntegrationError(error)
    }
}

impl From<String> for SirError {
    fn from(error: String) -> Self {
        SirError::SirError(error)
    }
}

impl From<&str> for SirError {
    fn from(error: &str) -> Self {
        SirError::SirError(error.to_string())
    }
}

impl std::error::Error for SirError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SirError::IoError(error) => Some(error),
            SirError::JsonError(error) => Some(error),
            SirError::CsvError(error) => Some(error),
            SirError::IntegrationError(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for SirError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SirError::IoError(error) => write!(f, "I/O error: {error}"),
            SirError::JsonError(error) => write!(f, "JSON error: {error}"),
            SirError::CsvError(error) => write!(f, "CSV error: {error}"),
            SirError::IntegrationError(error) => write!(f, "{error}"),
            SirError::UnknownParameter(name) => write!(f, "unknown parameter `{name}`"),
            SirError::InvalidParameterValue { field, value } => {
                write!(f, "invalid value `{value}` for parameter `{field}`")
            }
            SirError::ReportError(message) => write!(f, "report error: {message}"),
            SirError::SirError(message) => write!(f, "Error: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn integration_error_message_names_time() {
        let error = IntegrationError::new(IntegrationErrorKind::StepSizeUnderflow, 12.5);
        assert_eq!(
            error.to_string(),
            "simulation failed at t = 12.5: step size underflow"
        );
    }

    #[test]
    fn integration_error_converts_and_keeps_source() {
        let error: SirError = IntegrationError::new(IntegrationErrorKind::NonFinite, 3.0).into();
        assert!(matches!(
            error,
            SirError::IntegrationError(IntegrationError {
                kind: IntegrationErrorKind::NonFinite,
                ..
            })
        ));
        assert!(error.source().is_some());
    }

    #[test]
    fn string_errors_convert() {
        let error: SirError = "bad things".into();
        assert_eq!(error.to_string(), "Error: bad things");
    }
}
