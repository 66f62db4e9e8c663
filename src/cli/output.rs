//! Shared CLI output helpers.
//!
//! Everything goes to stderr: stdout is reserved for document output so the
//! commands stay pipeable. Colors respect NO_COLOR via `console`.

use console::style;

use crate::error::Error;

/// Print an error message to stderr (red).
///
/// Example: `✗ no identity matched any recipient`
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red(), msg);
}

/// Print a warning message to stderr (yellow).
///
/// Example: `⚠ unknown attribute: wat`
pub fn warn(msg: &str) {
    eprintln!("{} {}", style("⚠").yellow(), msg);
}

/// Print a hint message to stderr (cyan).
///
/// Example: `→ pass an identity file with -i/--identity`
pub fn hint(msg: &str) {
    eprintln!("{} {}", style("→").cyan(), style(msg).cyan());
}

/// Report the non-fatal errors collected during a YAML pass.
pub fn report_warnings(warnings: &[Error]) {
    for warning in warnings {
        warn(&warning.to_string());
    }
}
