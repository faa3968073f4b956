//! The `log` module configures the crate's logging. Logging is about the internal behaviour of a
//! run (days stepped, vaccines administered, degraded requests). It is not to be confused with
//! _reporting_, the CSV event logs written under the output location (see [`crate::report`]).
//!
//! The module (re)exports the five logging macros: `error!`, `warn!`, `info!`, `debug!` and
//! `trace!`. The crate uses `info!` for lifecycle messages, `debug!` for per-day detail and
//! `trace!` for per-pool detail.
//!
//! Logging is _disabled_ until configured. A decision process created from configuration sets the
//! level from `run.log_level` and points a file appender at `<output>/stride_log.txt`. It can also
//! be controlled programmatically:
//!
//!  - `enable_logging()`: turns on all log messages
//!  - `disable_logging()`: turns off all log messages
//!  - `set_log_level(level: LevelFilter)`: enables only log messages with priority at least `level`
//!  - `set_log_file(path)`: mirrors log messages to a file, or stops doing so with `None`
//!
//! In addition, per-module filtering of messages can be configured using `set_module_filter()` /
//! `set_module_filters()` and `remove_module_filter()`:
//!
//! ```rust
//! use stride_mdp::log::{set_module_filter, set_log_level, LevelFilter};
//!
//! pub fn setup_logging() {
//!     // Enable `info` log messages globally.
//!     set_log_level(LevelFilter::Info);
//!     // Show every transmission decision made by the infector.
//!     set_module_filter("stride_mdp::contact::infector", LevelFilter::Trace);
//! }
//! ```
mod standard_logger;

pub use log::{debug, error, info, trace, warn, LevelFilter};
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::{HashMap, StrideError};
use log4rs::Handle;
use std::sync::LazyLock;
use std::sync::{Mutex, MutexGuard};

// Logging disabled
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Off;
// Default module specific filters
const DEFAULT_MODULE_FILTERS: [(&str, LevelFilter); 1] = [
    // Per-pool transmission logs are only useful on request.
    ("stride_mdp::contact::infector", LevelFilter::Debug),
];

/// Name of the log file written inside the output location.
pub const LOG_FILE_NAME: &str = "stride_log.txt";

/// A global instance of the logging configuration.
static LOG_CONFIGURATION: LazyLock<Mutex<LogConfiguration>> = LazyLock::new(Mutex::default);

/// Different log level filters can be applied to the log messages emitted from different modules
/// according to the module path (e.g. `"stride_mdp::sim"`). These are stored in the global
/// `LogConfiguration`.
#[derive(Debug, PartialEq)]
struct ModuleLogConfiguration {
    /// The module path this configuration applies to
    module: String,
    /// The maximum log level for this module path
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

/// Holds logging configuration. It's primary responsibility is to keep track of the filter levels
/// of modules, the optional log file, and hold a handle to the global logger.
///
/// Because loggers are globally installed, only one instance of this struct should exist. The
/// public API are free functions which fetch the singleton and call the appropriate member
/// function.
#[derive(Debug)]
pub(in crate::log) struct LogConfiguration {
    /// The "default" level filter for modules ("targets") without an explicitly set filter. A
    /// global filter level of `LevelFilter::Off` disables logging.
    pub(in crate::log) global_log_level: LevelFilter,
    pub(in crate::log) module_configurations: HashMap<String, ModuleLogConfiguration>,
    /// When set, messages are also appended to this file.
    pub(in crate::log) log_file: Option<PathBuf>,

    /// Handle to the `log4rs` logger.
    root_handle: Option<Handle>,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        let module_configurations = DEFAULT_MODULE_FILTERS
            .map(|(module, level)| (module.to_string(), (module, level).into()));
        let module_configurations = HashMap::from_iter(module_configurations);
        Self {
            global_log_level: DEFAULT_LOG_LEVEL,
            module_configurations,
            log_file: None,
            root_handle: None,
        }
    }
}

impl LogConfiguration {
    pub(in crate::log) fn set_log_level(&mut self, level: LevelFilter) {
        self.global_log_level = level;
        self.set_config();
    }

    pub(in crate::log) fn set_log_file(&mut self, path: Option<PathBuf>) {
        if self.log_file == path {
            return;
        }
        self.log_file = path;
        self.set_config();
    }

    /// Returns true if the configuration was mutated, false otherwise.
    fn insert_module_filter(&mut self, module: &String, level: LevelFilter) -> bool {
        match self.module_configurations.entry(module.clone()) {
            Entry::Occupied(mut entry) => {
                let module_config = entry.get_mut();
                if module_config.level == level {
                    return false;
                }
                module_config.level = level;
            }

            Entry::Vacant(entry) => {
                entry.insert(ModuleLogConfiguration {
                    module: module.to_string(),
                    level,
                });
            }
        }
        true
    }

    pub(in crate::log) fn set_module_filter<S: ToString>(
        &mut self,
        module: &S,
        level: LevelFilter,
    ) {
        if self.insert_module_filter(&module.to_string(), level) {
            self.set_config();
        }
    }

    pub(in crate::log) fn set_module_filters<S: ToString>(
        &mut self,
        module_filters: &[(&S, LevelFilter)],
    ) {
        let mut mutated: bool = false;
        for (module, level) in module_filters {
            mutated |= self.insert_module_filter(&module.to_string(), *level);
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

// The public API

/// Enables the logger with no global level filter / full logging. Equivalent to
/// `set_log_level(LevelFilter::Trace)`.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Disables logging completely. Equivalent to `set_log_level(LevelFilter::Off)`.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

/// Sets the global log level. A global filter level of `LevelFilter::Off` disables logging.
pub fn set_log_level(level: LevelFilter) {
    let mut log_configuration = get_log_configuration();
    log_configuration.set_log_level(level);
}

/// Parses a level name such as `"info"` or `"off"` (case-insensitive).
pub fn parse_log_level(level: &str) -> Result<LevelFilter, StrideError> {
    LevelFilter::from_str(level.trim())
        .map_err(|_| StrideError::ConfigInvalid(format!("unknown log level `{level}`")))
}

/// Mirrors log messages into the file at `path`, or stops writing a file with `None`.
pub fn set_log_file(path: Option<&Path>) {
    let mut log_configuration = get_log_configuration();
    log_configuration.set_log_file(path.map(Path::to_path_buf));
}

/// Sets a level filter for the given module path.
pub fn set_module_filter(module_path: &str, level_filter: LevelFilter) {
    let mut log_configuration = get_log_configuration();
    log_configuration.set_module_filter(&module_path, level_filter);
}

/// Removes a module-specific level filter for the given module path. The global level filter will
/// apply to the module.
pub fn remove_module_filter(module_path: &str) {
    let mut log_configuration = get_log_configuration();
    log_configuration.remove_module_filter(module_path);
}

/// Sets the level filters for a set of modules according to the provided map. Use this instead of
/// `set_module_filter()` to set filters in bulk.
#[allow(clippy::implicit_hasher)]
pub fn set_module_filters<S: ToString>(module_filters: &[(&S, LevelFilter)]) {
    let mut log_configuration = get_log_configuration();
    log_configuration.set_module_filters(module_filters);
}

/// Fetches a mutable reference to the global `LogConfiguration`.
fn get_log_configuration() -> MutexGuard<'static, LogConfiguration> {
    LOG_CONFIGURATION.lock().expect("Mutex poisoned")
}

#[cfg(test)]
mod tests {
    use super::{
        get_log_configuration, parse_log_level, remove_module_filter, set_log_file,
        set_log_level, set_module_filters, LOG_FILE_NAME,
    };
    use log::{error, info, trace, LevelFilter};
    use std::sync::{LazyLock, Mutex};

    // Force logging tests to run serially for consistent behavior.
    static TEST_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(Mutex::default);

    #[test]
    fn test_set_log_level() {
        let _guard = TEST_MUTEX.lock().expect("Mutex poisoned");
        set_log_level(LevelFilter::Trace);
        set_log_level(LevelFilter::Error);
        {
            let config = get_log_configuration();
            assert_eq!(config.global_log_level, LevelFilter::Error);
            error!("test_set_log_level: global set to error");
            trace!("test_set_log_level: NOT EMITTED");
        }
        set_log_level(LevelFilter::Trace);
        {
            let config = get_log_configuration();
            assert_eq!(config.global_log_level, LevelFilter::Trace);
            assert_eq!(log::max_level(), LevelFilter::Trace);
        }
        set_log_level(LevelFilter::Off);
    }

    #[test]
    fn test_set_remove_module_filters() {
        let _guard = TEST_MUTEX.lock().expect("Mutex poisoned");
        set_log_level(LevelFilter::Trace);
        {
            let config = get_log_configuration();
            assert_eq!(
                config
                    .module_configurations
                    .get("stride_mdp::contact::infector"),
                Some(&("stride_mdp::contact::infector", LevelFilter::Debug).into())
            );
        }

        let filters: [(&&str, LevelFilter); 2] = [
            (&"stride_mdp::sim", LevelFilter::Error),
            (&"stride_mdp::mdp", LevelFilter::Debug),
        ];
        set_module_filters(&filters);
        {
            let config = get_log_configuration();
            for (module_path, level) in &filters {
                assert_eq!(
                    config.module_configurations.get(**module_path),
                    Some(&((**module_path, *level).into()))
                );
            }
        }

        remove_module_filter("stride_mdp::sim");
        remove_module_filter("stride_mdp::mdp");
        {
            let config = get_log_configuration();
            assert!(!config.module_configurations.contains_key("stride_mdp::sim"));
            assert!(!config.module_configurations.contains_key("stride_mdp::mdp"));
        }
        set_log_level(LevelFilter::Off);
    }

    #[test]
    fn log_file_receives_messages() {
        let _guard = TEST_MUTEX.lock().expect("Mutex poisoned");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOG_FILE_NAME);
        set_log_level(LevelFilter::Info);
        set_log_file(Some(&path));
        info!("written to the log file");
        set_log_file(None);
        set_log_level(LevelFilter::Off);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("written to the log file"));
    }

    #[test]
    fn parses_level_names() {
        assert_eq!(parse_log_level("info").unwrap(), LevelFilter::Info);
        assert_eq!(parse_log_level("TRACE").unwrap(), LevelFilter::Trace);
        assert!(parse_log_level("chatty").is_err());
    }
}
