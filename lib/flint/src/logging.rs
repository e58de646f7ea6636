//! Thin facade over `slog` so the rest of the workspace imports one module.
//!
//! Convention: constructors take `L: Into<Option<&Logger>>` and fall back to
//! a `Discard` root, so library types stay usable in tests without wiring a
//! drain.

pub use slog::{crit, debug, error, info, o, trace, warn};
pub use slog::{Discard, Drain, Level, Logger};

use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::types::Severity;
use sloggers::Build;

/// Builds the terminal root logger used by the server binaries.
///
/// Unknown level strings fall back to `info` rather than failing startup.
pub fn terminal(level: &str) -> Logger {
    let severity = match level {
        "trace" => Severity::Trace,
        "debug" => Severity::Debug,
        "warning" | "warn" => Severity::Warning,
        "error" => Severity::Error,
        "critical" => Severity::Critical,
        _ => Severity::Info,
    };

    let mut builder = TerminalLoggerBuilder::new();
    builder.level(severity);
    builder.destination(Destination::Stderr);

    builder.build().expect("terminal logger construction cannot fail")
}

/// Root logger that swallows everything. Default for tests and for
/// subsystems constructed without a parent logger.
pub fn discard() -> Logger {
    Logger::root(Discard, o!())
}

/// Resolves the optional-parent convention used by subsystem constructors.
pub fn child<'a, L: Into<Option<&'a Logger>>>(log: L) -> Logger {
    match log.into() {
        Some(log) => log.new(o!()),
        None => discard(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_from_none() {
        // Must not panic and must be usable.
        let log = child(None);
        info!(log, "discarded");
    }

    #[test]
    fn test_child_inherits() {
        let root = discard();
        let log = child(&root);
        debug!(log, "discarded"; "key" => 1);
    }
}
