//! Without the `logging` feature nothing is printed, but the level is still tracked so that
//! `log::max_level()` short-circuits disabled messages.

use crate::log::LogConfiguration;

impl LogConfiguration {
    pub(in crate::log) fn set_config(&mut self) {
        log::set_max_level(self.global_log_level);
    }
}
