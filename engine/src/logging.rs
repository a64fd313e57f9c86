//! FILENAME: engine/src/logging.rs
// PURPOSE: Category-tagged logging macros over the `log` facade.
// CONTEXT: Every engine and pivot log line carries a category ("FILTER",
// "SORT", "PIVOT", ...) that becomes the log target. The library never
// installs a logger; binaries and tests choose one.

pub use log::Level;

/// Write a log line for `category`.
pub fn write_log(level: Level, category: &str, message: &str) {
    log::log!(target: category, level, "{}", message);
}

/// Write an ENTER log line for function entry
pub fn write_log_enter(category: &str, func_name: &str, params: &str) {
    if params.is_empty() {
        write_log(Level::Trace, category, &format!("ENTER {}", func_name));
    } else {
        write_log(Level::Trace, category, &format!("ENTER {} {}", func_name, params));
    }
}

/// Write an EXIT log line for function exit
pub fn write_log_exit(category: &str, func_name: &str, result: &str) {
    if result.is_empty() {
        write_log(Level::Trace, category, &format!("EXIT {}", func_name));
    } else {
        write_log(Level::Trace, category, &format!("EXIT {} {}", func_name, result));
    }
}

#[macro_export]
macro_rules! log_debug {
    ($cat:expr, $($arg:tt)*) => {
        $crate::logging::write_log($crate::logging::Level::Debug, $cat, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($cat:expr, $($arg:tt)*) => {
        $crate::logging::write_log($crate::logging::Level::Info, $cat, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($cat:expr, $($arg:tt)*) => {
        $crate::logging::write_log($crate::logging::Level::Warn, $cat, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($cat:expr, $($arg:tt)*) => {
        $crate::logging::write_log($crate::logging::Level::Error, $cat, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_enter {
    ($cat:expr, $func:expr) => {
        $crate::logging::write_log_enter($cat, $func, "")
    };
    ($cat:expr, $func:expr, $($arg:tt)*) => {
        $crate::logging::write_log_enter($cat, $func, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_exit {
    ($cat:expr, $func:expr) => {
        $crate::logging::write_log_exit($cat, $func, "")
    };
    ($cat:expr, $func:expr, $($arg:tt)*) => {
        $crate::logging::write_log_exit($cat, $func, &format!($($arg)*))
    };
}
