//! The parameter store: the single owner of the live model parameters.
//!
//! Every write goes through [`ParameterStore::set`], which clamps the value into the field's
//! closed range instead of failing. The initial susceptible count is never stored; it is derived
//! on every read as `max(N − I0 − R0, 0)`, so an infeasible `I0 + R0 > N` is read as "everyone
//! else has already been removed".
//!
//! Inside a [`Context`] the store is a data plugin reached through [`ContextParametersExt`], and
//! every effective change is announced with a [`ParameterChangeEvent`]:
//!
//! ```
//! use sir_explorer::prelude::*;
//!
//! let mut context = Context::new();
//! context.subscribe_to_event(|_context, event: ParameterChangeEvent| {
//!     info!("{} changed to {}", event.field, event.current);
//! });
//! context.set_parameter(ParameterField::InfectionRate, 0.25);
//! context.execute();
//! assert_eq!(context.get_parameters().infection_rate, 0.25);
//! ```
use std::path::Path;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::context::{Context, Event};
use crate::define_data_plugin;
use crate::error::SirError;
use crate::model::{CompartmentState, SirModel};

/// One of the five tunable parameters.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum ParameterField {
    #[strum(to_string = "population", serialize = "N")]
    #[serde(alias = "N")]
    Population,
    #[strum(to_string = "initial_infected", serialize = "I0")]
    #[serde(alias = "I0")]
    InitialInfected,
    #[strum(to_string = "initial_recovered", serialize = "R0")]
    #[serde(alias = "R0")]
    InitialRecovered,
    #[strum(to_string = "infection_rate", serialize = "beta")]
    #[serde(alias = "beta")]
    InfectionRate,
    #[strum(to_string = "recovery_rate", serialize = "gamma")]
    #[serde(alias = "gamma")]
    RecoveryRate,
}

/// Admissible values of a field. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
    pub default: f64,
    /// Integer fields are truncated toward zero after clamping.
    pub integer: bool,
}

impl ParameterRange {
    /// Clamps `value` into the range. `NaN` has no nearest bound and yields `None`.
    #[must_use]
    pub fn clamp(&self, value: f64) -> Option<f64> {
        if value.is_nan() {
            return None;
        }
        let clamped = value.clamp(self.min, self.max);
        Some(if self.integer {
            clamped.trunc()
        } else {
            clamped
        })
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl ParameterField {
    #[must_use]
    pub const fn range(self) -> ParameterRange {
        match self {
            ParameterField::Population => ParameterRange {
                min: 100.0,
                max: 5_000_000.0,
                default: 1000.0,
                integer: false,
            },
            ParameterField::InitialInfected => ParameterRange {
                min: 1.0,
                max: 1_000_000.0,
                default: 1.0,
                integer: true,
            },
            ParameterField::InitialRecovered => ParameterRange {
                min: 0.0,
                max: 500_000.0,
                default: 0.0,
                integer: true,
            },
            ParameterField::InfectionRate => ParameterRange {
                min: 0.05,
                max: 1.0,
                default: 0.4,
                integer: false,
            },
            ParameterField::RecoveryRate => ParameterRange {
                min: 0.01,
                max: 1.0,
                default: 0.1,
                integer: false,
            },
        }
    }
}

/// A snapshot of all five parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// N
    pub population: f64,
    /// I0
    pub initial_infected: u64,
    /// R0 (the initial recovered count, not the reproduction number)
    pub initial_recovered: u64,
    /// β
    pub infection_rate: f64,
    /// γ
    pub recovery_rate: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            population: 1000.0,
            initial_infected: 1,
            initial_recovered: 0,
            infection_rate: 0.4,
            recovery_rate: 0.1,
        }
    }
}

impl Parameters {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn get(&self, field: ParameterField) -> f64 {
        match field {
            ParameterField::Population => self.population,
            ParameterField::InitialInfected => self.initial_infected as f64,
            ParameterField::InitialRecovered => self.initial_recovered as f64,
            ParameterField::InfectionRate => self.infection_rate,
            ParameterField::RecoveryRate => self.recovery_rate,
        }
    }

    /// Stores an already clamped value.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn put(&mut self, field: ParameterField, value: f64) {
        match field {
            ParameterField::Population => self.population = value,
            ParameterField::InitialInfected => self.initial_infected = value as u64,
            ParameterField::InitialRecovered => self.initial_recovered = value as u64,
            ParameterField::InfectionRate => self.infection_rate = value,
            ParameterField::RecoveryRate => self.recovery_rate = value,
        }
    }

    /// `max(N − I0 − R0, 0)`.
    #[must_use]
    pub fn initial_susceptible(&self) -> f64 {
        let remaining = self.population
            - self.get(ParameterField::InitialInfected)
            - self.get(ParameterField::InitialRecovered);
        remaining.max(0.0)
    }

    /// `(S0, I0, R0)` with the clamped susceptible count.
    #[must_use]
    pub fn initial_state(&self) -> CompartmentState {
        CompartmentState::new(
            self.initial_susceptible(),
            self.get(ParameterField::InitialInfected),
            self.get(ParameterField::InitialRecovered),
        )
    }

    #[must_use]
    pub fn model(&self) -> SirModel {
        SirModel::new(self.population, self.infection_rate, self.recovery_rate)
    }
}

/// What a call to [`ParameterStore::set`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterUpdate {
    pub field: ParameterField,
    pub requested: f64,
    pub previous: f64,
    pub current: f64,
}

impl ParameterUpdate {
    #[must_use]
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }

    #[must_use]
    pub fn clamped(&self) -> bool {
        self.requested != self.current
    }
}

/// Holds the live parameters and a revision counter bumped on every effective change.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    parameters: Parameters,
    revision: u64,
}

impl ParameterStore {
    /// A store holding the default parameters at revision 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A consistent copy of the current parameters.
    #[must_use]
    pub fn get(&self) -> Parameters {
        self.parameters
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Clamps `value` into the field's range and stores it. Returns `None`, leaving the store
    /// untouched, when `value` is NaN.
    pub fn set(&mut self, field: ParameterField, value: f64) -> Option<ParameterUpdate> {
        let range = field.range();
        let Some(current) = range.clamp(value) else {
            warn!("ignoring NaN for {field}");
            return None;
        };
        let update = ParameterUpdate {
            field,
            requested: value,
            previous: self.parameters.get(field),
            current,
        };
        if !range.contains(value) {
            warn!(
                "{field} = {value} is outside [{}, {}], using {current}",
                range.min, range.max
            );
        }
        if update.changed() {
            self.parameters.put(field, current);
            self.revision += 1;
            debug!(
                "{field}: {} -> {current} (revision {})",
                update.previous, self.revision
            );
        }
        Some(update)
    }

    #[must_use]
    pub fn initial_susceptible(&self) -> f64 {
        self.parameters.initial_susceptible()
    }
}

/// Emitted after a parameter's stored value changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterChangeEvent {
    pub field: ParameterField,
    pub previous: f64,
    pub current: f64,
    /// Store revision after the change.
    pub revision: u64,
}

impl Event for ParameterChangeEvent {}

/// A parameter change to apply at a given simulation time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduledChange {
    pub time: f64,
    pub field: ParameterField,
    pub value: f64,
}

/// Parameter file contents. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParametersConfig {
    #[serde(alias = "N")]
    pub population: Option<f64>,
    #[serde(alias = "I0")]
    pub initial_infected: Option<f64>,
    #[serde(alias = "R0")]
    pub initial_recovered: Option<f64>,
    #[serde(alias = "beta")]
    pub infection_rate: Option<f64>,
    #[serde(alias = "gamma")]
    pub recovery_rate: Option<f64>,
    #[serde(default)]
    pub changes: Vec<ScheduledChange>,
}

impl ParametersConfig {
    /// The fields present in the file, in declaration order.
    #[must_use]
    pub fn values(&self) -> Vec<(ParameterField, f64)> {
        ParameterField::iter()
            .zip([
                self.population,
                self.initial_infected,
                self.initial_recovered,
                self.infection_rate,
                self.recovery_rate,
            ])
            .filter_map(|(field, value)| value.map(|value| (field, value)))
            .collect()
    }
}

/// Parses `field=value`, e.g. `beta=0.3` or `initial_infected=10`.
///
/// # Errors
///
/// Returns `SirError::UnknownParameter` for an unrecognized field name and
/// `SirError::InvalidParameterValue` when the text is not `name=number`.
pub fn parse_assignment(text: &str) -> Result<(ParameterField, f64), SirError> {
    let Some((name, value)) = text.split_once('=') else {
        return Err(SirError::InvalidParameterValue {
            field: text.to_string(),
            value: String::new(),
        });
    };
    let field = ParameterField::from_str(name.trim())
        .map_err(|_| SirError::UnknownParameter(name.trim().to_string()))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|_| SirError::InvalidParameterValue {
            field: field.to_string(),
            value: value.trim().to_string(),
        })?;
    Ok((field, value))
}

define_data_plugin!(ParameterStorePlugin, ParameterStore, ParameterStore::new());

pub trait ContextParametersExt {
    /// A consistent snapshot of the current parameters.
    fn get_parameters(&self) -> Parameters;

    /// Revision of the parameter store; 0 until the first effective change.
    fn parameter_revision(&self) -> u64;

    /// Clamps and stores `value`, emitting a [`ParameterChangeEvent`] if the stored value
    /// changed. Returns the stored value.
    fn set_parameter(&mut self, field: ParameterField, value: f64) -> f64;

    /// Applies `value` to `field` at simulation time `time`.
    fn schedule_parameter_change(&mut self, time: f64, field: ParameterField, value: f64);

    /// Applies every field of `config` now and schedules its `changes`.
    ///
    /// # Errors
    ///
    /// Returns [`SirError::InvalidParameterValue`] if a change is due at a time that is not
    /// finite or lies in the past. Nothing is applied in that case.
    fn apply_parameters_config(&mut self, config: &ParametersConfig) -> Result<(), SirError>;

    /// Reads a [`ParametersConfig`] from a JSON file and applies it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid parameter file.
    fn load_parameters_from_json(&mut self, path: &Path) -> Result<ParametersConfig, SirError>;
}

impl ContextParametersExt for Context {
    fn get_parameters(&self) -> Parameters {
        self.get_data(ParameterStorePlugin)
            .map(ParameterStore::get)
            .unwrap_or_default()
    }

    fn parameter_revision(&self) -> u64 {
        self.get_data(ParameterStorePlugin)
            .map_or(0, ParameterStore::revision)
    }

    fn set_parameter(&mut self, field: ParameterField, value: f64) -> f64 {
        let store = self.get_data_mut(ParameterStorePlugin);
        let Some(update) = store.set(field, value) else {
            return store.get().get(field);
        };
        if update.changed() {
            let revision = store.revision();
            self.emit_event(ParameterChangeEvent {
                field,
                previous: update.previous,
                current: update.current,
                revision,
            });
        }
        update.current
    }

    fn schedule_parameter_change(&mut self, time: f64, field: ParameterField, value: f64) {
        self.add_plan(time, move |context| {
            context.set_parameter(field, value);
        });
    }

    fn apply_parameters_config(&mut self, config: &ParametersConfig) -> Result<(), SirError> {
        let now = self.get_current_time();
        if let Some(change) = config
            .changes
            .iter()
            .find(|change| !change.time.is_finite() || change.time < now)
        {
            return Err(SirError::InvalidParameterValue {
                field: "time".to_string(),
                value: change.time.to_string(),
            });
        }
        for (field, value) in config.values() {
            self.set_parameter(field, value);
        }
        for change in &config.changes {
            self.schedule_parameter_change(change.time, change.field, change.value);
        }
        Ok(())
    }

    fn load_parameters_from_json(&mut self, path: &Path) -> Result<ParametersConfig, SirError> {
        let file = std::fs::File::open(path)?;
        let config: ParametersConfig = serde_json::from_reader(std::io::BufReader::new(file))?;
        self.apply_parameters_config(&config)?;
        Ok(config)
    }
}
