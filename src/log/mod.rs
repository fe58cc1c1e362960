//! Diagnostic logging for the simulator. This is separate from _reports_, which record the
//! trajectories themselves.
//!
//! Modules emit messages with the five macros re-exported here, from `error!` (highest priority)
//! down to `trace!`:
//!
//! ```rust
//! use sir_explorer::info;
//!
//! pub fn announce() {
//!     info!("starting a sweep over infection rates");
//! }
//! ```
//!
//! Logging is _off_ by default. The command line enables it with `--log-level <level>` or `-v`;
//! code can use [`enable_logging`], [`disable_logging`] and [`set_log_level`]. Per-module levels
//! are set with [`set_module_filter`] / [`set_module_filters`] and cleared with
//! [`remove_module_filter`]:
//!
//! ```rust
//! use sir_explorer::log::{set_log_level, set_module_filter, LevelFilter};
//!
//! set_log_level(LevelFilter::Info);
//! // Step-by-step solver statistics.
//! set_module_filter("sir_explorer::integrator", LevelFilter::Trace);
//! ```
#[cfg(feature = "logging")]
mod standard_logger;

#[cfg(not(feature = "logging"))]
mod null_logger;

pub use log::{debug, error, info, trace, warn, LevelFilter};
use std::collections::hash_map::Entry;
use std::str::FromStr;
use std::sync::LazyLock;
use std::sync::{Mutex, MutexGuard};

#[cfg(feature = "logging")]
use log4rs::Handle;

use crate::error::SirError;
use crate::hashing::HashMap;

const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Off;

static LOG_CONFIGURATION: LazyLock<Mutex<LogConfiguration>> = LazyLock::new(Mutex::default);

/// A level filter for one module path, e.g. `"sir_explorer::controller"`.
#[derive(Debug, PartialEq)]
struct ModuleLogConfiguration {
    module: String,
    level: LevelFilter,
}

impl From<(&str, LevelFilter)> for ModuleLogConfiguration {
    fn from((module, level): (&str, LevelFilter)) -> Self {
        Self {
            module: module.to_string(),
            level,
        }
    }
}

/// The global level, the per-module levels and the handle of the installed logger.
///
/// Loggers are installed process-wide, so there is one instance behind [`LOG_CONFIGURATION`] and
/// the public API is a set of free functions.
#[derive(Debug)]
pub(in crate::log) struct LogConfiguration {
    /// Level for modules without their own filter. `Off` disables logging.
    pub(in crate::log) global_log_level: LevelFilter,
    pub(in crate::log) module_configurations: HashMap<String, ModuleLogConfiguration>,

    #[cfg(feature = "logging")]
    root_handle: Option<Handle>,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        Self {
            global_log_level: DEFAULT_LOG_LEVEL,
            module_configurations: HashMap::default(),

            #[cfg(feature = "logging")]
            root_handle: None,
        }
    }
}

impl LogConfiguration {
    pub(in crate::log) fn set_log_level(&mut self, level: LevelFilter) {
        self.global_log_level = level;
        self.set_config();
    }

    /// Returns true if the configuration changed.
    fn insert_module_filter(&mut self, module: &str, level: LevelFilter) -> bool {
        match self.module_configurations.entry(module.to_string()) {
            Entry::Occupied(mut entry) => {
                let module_config = entry.get_mut();
                if module_config.level == level {
                    return false;
                }
                module_config.level = level;
            }
            Entry::Vacant(entry) => {
                entry.insert((module, level).into());
            }
        }
        true
    }

    pub(in crate::log) fn set_module_filters(&mut self, module_filters: &[(&str, LevelFilter)]) {
        let mut mutated = false;
        for (module, level) in module_filters {
            mutated |= self.insert_module_filter(module, *level);
        }
        if mutated {
            self.set_config();
        }
    }

    pub(in crate::log) fn remove_module_filter(&mut self, module: &str) {
        if self.module_configurations.remove(module).is_some() {
            self.set_config();
        }
    }
}

/// A parsed `--log-level` argument: an optional global level and any number of module levels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSpec {
    pub level: Option<LevelFilter>,
    pub module_filters: Vec<(String, LevelFilter)>,
}

impl FromStr for LogSpec {
    type Err = SirError;

    /// Parses `"info"`, `"sir_explorer::integrator=trace"` or a comma separated mix of both.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut spec = LogSpec::default();
        for item in text.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            match item.split_once('=') {
                Some((module, level)) => {
                    let module = module.trim();
                    if module.is_empty() {
                        return Err(SirError::SirError(format!(
                            "missing module name in log filter `{item}`"
                        )));
                    }
                    spec.module_filters
                        .push((module.to_string(), parse_level(level.trim())?));
                }
                None => spec.level = Some(parse_level(item)?),
            }
        }
        Ok(spec)
    }
}

fn parse_level(text: &str) -> Result<LevelFilter, SirError> {
    LevelFilter::from_str(text)
        .map_err(|_| SirError::SirError(format!("invalid log level `{text}`")))
}

// The public API

/// Turns on every message. Same as `set_log_level(LevelFilter::Trace)`.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Turns off every message. Same as `set_log_level(LevelFilter::Off)`.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

/// Sets the level for modules without their own filter.
pub fn set_log_level(level: LevelFilter) {
    get_log_configuration().set_log_level(level);
}

pub fn set_module_filter(module_path: &str, level_filter: LevelFilter) {
    get_log_configuration().set_module_filters(&[(module_path, level_filter)]);
}

/// Sets several module filters while rebuilding the logger only once.
pub fn set_module_filters(module_filters: &[(&str, LevelFilter)]) {
    get_log_configuration().set_module_filters(module_filters);
}

/// The module falls back to the global level.
pub fn remove_module_filter(module_path: &str) {
    get_log_configuration().remove_module_filter(module_path);
}

/// Applies a parsed `--log-level` argument.
pub fn apply_log_spec(spec: &LogSpec) {
    let mut log_configuration = get_log_configuration();
    let filters: Vec<(&str, LevelFilter)> = spec
        .module_filters
        .iter()
        .map(|(module, level)| (module.as_str(), *level))
        .collect();
    log_configuration.set_module_filters(&filters);
    if let Some(level) = spec.level {
        log_configuration.set_log_level(level);
    }
}

fn get_log_configuration() -> MutexGuard<'static, LogConfiguration> {
    // A panic while holding the lock leaves the configuration itself intact.
    LOG_CONFIGURATION
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
