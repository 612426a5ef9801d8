//! Terminal output formatting utilities.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tether_core::{DIALOG_LINK_TOOLTIP, Dialog};
use tether_gitea::SyncStatus;

static QUIET_MODE: AtomicBool = AtomicBool::new(false);

/// Set quiet mode globally. Call once at startup.
pub fn set_quiet(quiet: bool) {
    QUIET_MODE.store(quiet, Ordering::Relaxed);
}

fn is_quiet() -> bool {
    QUIET_MODE.load(Ordering::Relaxed)
}

/// Print a success message (suppressed in quiet mode).
pub fn success(msg: &str) {
    if !is_quiet() {
        println!("{} {}", "✓".green(), msg);
    }
}

/// Print an error message (always prints to stderr).
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a warning message (always prints to stderr).
pub fn warn(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

/// Print an info message (suppressed in quiet mode).
pub fn info(msg: &str) {
    if !is_quiet() {
        println!("{} {}", "→".blue(), msg);
    }
}

/// Print a detail line without prefix (suppressed in quiet mode).
pub fn detail(msg: &str) {
    if !is_quiet() {
        println!("{msg}");
    }
}

/// Print essential machine-readable output (always prints).
pub fn essential(msg: &str) {
    println!("{msg}");
}

/// Spinner on stderr while an action is in flight; hidden in quiet mode.
pub fn spinner(msg: &str) -> ProgressBar {
    if is_quiet() {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(msg.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Short colored label for a sync status.
#[must_use]
pub fn status_label(status: &SyncStatus) -> String {
    if status.conflict {
        format!("{} conflict", "●".red())
    } else if status.error {
        format!("{} error", "●".red())
    } else if status.merge_needed {
        format!("{} merge needed", "●".yellow())
    } else if status.success {
        format!("{} up to date", "●".green())
    } else {
        format!("{} unknown", "○".dimmed())
    }
}

/// One status row: label, state, and the pull request link if any.
#[must_use]
pub fn status_line(name: &str, status: &SyncStatus) -> String {
    let mut line = format!("{name:<8} {}", status_label(status));
    if !status.pull_request.is_empty() {
        line.push_str(&format!("  {}", status.pull_request.underline()));
    }
    line
}

/// Print a gate dialog (to stderr, like other warnings).
pub fn dialog(dialog: &Dialog) {
    warn(&dialog.title.bold().to_string());
    eprintln!("  {}", dialog.message);
    if !dialog.link.is_empty() {
        eprintln!("  {}: {}", DIALOG_LINK_TOOLTIP.dimmed(), dialog.link.underline());
    }
}
