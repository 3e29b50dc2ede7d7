//! Logging facilities.
//!
//! Upstream frames last 125 us, so messages are stamped with the simulation time in microseconds.
//! Each line carries `[<time us> <LEVEL> <component>]` and uses the component name as the log
//! target, so `RUST_LOG=olt=trace` selects one component.

use atty::Stream;
use colored::{Color, ColoredString, Colorize};

/// Applies the color to the string if stderr (log) goes to console.
pub fn get_colored(s: &str, color: Color) -> ColoredString {
    if atty::is(Stream::Stderr) {
        s.color(color)
    } else {
        s.normal()
    }
}

/// Simulation time of `nanos` in microseconds, as printed by the logging macros.
pub fn micros(nanos: u64) -> f64 {
    nanos as f64 / 1e3
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($level:ident, $label:expr, $color:ident, $ctx:expr, $msg:expr) => (
        log::$level!(
            target: $ctx.name(),
            "[{:>12.3} {:<5} {}] {}",
            $crate::log::micros($ctx.time_nanos()),
            $crate::log::get_colored($label, $crate::colored::Color::$color),
            $ctx.name(),
            $msg
        )
    );
    ($level:ident, $label:expr, $color:ident, $ctx:expr, $format:expr, $($arg:tt)+) => (
        log::$level!(
            target: $ctx.name(),
            concat!("[{:>12.3} {:<5} {}] ", $format),
            $crate::log::micros($ctx.time_nanos()),
            $crate::log::get_colored($label, $crate::colored::Color::$color),
            $ctx.name(),
            $($arg)+
        )
    );
}

/// Logs a message at the info level.
///
/// # Examples
///
/// ```rust
/// use std::io::Write;
/// use env_logger::Builder;
/// use sugars::{rc, refcell};
/// use dslab_xgpon::log_info;
/// use dslab_xgpon::context::{SimulationContext, SimulationState};
///
/// Builder::from_default_env()
///     .format(|buf, record| writeln!(buf, "{}", record.args()))
///     .init();
///
/// let ctx = SimulationContext::new("olt", rc!(refcell!(SimulationState::new(123))));
/// log_info!(ctx, "started with {} ONUs", 16);
/// ```
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_at!(info, "INFO", Green, $ctx, $($arg)+));
}

/// Logs a message at the debug level.
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_at!(debug, "DEBUG", Blue, $ctx, $($arg)+));
}

/// Logs a message at the trace level.
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_trace {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_at!(trace, "TRACE", Cyan, $ctx, $($arg)+));
}

/// Logs a message at the warn level.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_at!(warn, "WARN", Yellow, $ctx, $($arg)+));
}

/// Logs a message at the error level.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_at!(error, "ERROR", Red, $ctx, $($arg)+));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_boundaries_in_micros() {
        assert_eq!(micros(125_000), 125.);
        assert_eq!(micros(1_500), 1.5);
    }
}
