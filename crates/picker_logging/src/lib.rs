#![deny(missing_docs)]
//! Shared logging utilities for the media picker workspace.
//!
//! This crate provides the `picker_*` logging macros used by the engine and
//! the command-line driver, plus a minimal test initializer for the global
//! logger. All macros log under the `media_picker` target so the driver can
//! filter third-party noise separately.

/// Log target shared by every `picker_*` macro.
pub const TARGET: &str = "media_picker";

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! picker_trace {
    ($($arg:tt)*) => {{
        log::trace!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! picker_debug {
    ($($arg:tt)*) => {{
        log::debug!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! picker_info {
    ($($arg:tt)*) => {{
        log::info!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! picker_warn {
    ($($arg:tt)*) => {{
        log::warn!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! picker_error {
    ($($arg:tt)*) => {{
        log::error!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Shortens a URL for log lines; data URLs and signed CDN links get long.
pub fn abbreviate(url: &str) -> &str {
    const MAX: usize = 80;
    if url.len() <= MAX {
        return url;
    }
    let mut end = MAX;
    while end > 0 && !url.is_char_boundary(end) {
        end -= 1;
    }
    &url[..end]
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
