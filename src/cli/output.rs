//! Terminal output formatting with colors
//!
//! Respects NO_COLOR, CLICOLOR, CLICOLOR_FORCE automatically.

use colored::Colorize;

use crate::application::services::{BatchFailure, BatchReport};

/// Print error (red bold "error:" prefix) to stderr
pub fn error(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

/// Print warning (yellow "Warning:" prefix) to stderr
pub fn warning(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "Warning".yellow(), msg);
}

/// Print success status (green checkmark)
pub fn success(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{} {}", "✓".green(), msg);
}

/// Print failure status (red X, indented)
pub fn failure(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("  {} {}", "✗".red(), msg);
}

/// Print completed action (green label)
pub fn action(label: &str, msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}: {}", label.green(), msg);
}

/// Print section header (cyan bold)
pub fn header(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg.to_string().cyan().bold());
}

/// Print indented detail (no color)
pub fn detail(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("  {}", msg);
}

/// Print plain output (no color, for data)
pub fn info(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg);
}

/// Print a batch report: summary line, then one line per failure.
pub fn batch_report(report: &BatchReport) {
    header(&format!("{} {}", report.kind, report.period));
    detail(&format!(
        "completed {}, already done {}, not growing {}",
        report.completed.len(),
        report.skipped_done.len(),
        report.skipped_status.len()
    ));
    if report.credited > 0 {
        detail(&format!("credited {}", report.credited));
    }
    for f in &report.failures {
        match f {
            BatchFailure::Node { node, error } => failure(&format!("{}: {}", node, error)),
            BatchFailure::Engagement {
                node,
                member,
                message,
            } => failure(&format!("{} member {}: {}", node, member, message)),
            BatchFailure::Persistence { node, message } => {
                failure(&format!("{}: {}", node, message))
            }
        }
    }
    if report.cancelled {
        warning("run cancelled, remaining nodes not processed");
    }
}
