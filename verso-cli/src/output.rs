//! Styled terminal output utilities.

use owo_colors::OwoColorize;
use verso_core::RunTracker;

/// Print the banner
pub fn banner() {
    println!(
        "{} {}",
        "verso".bright_cyan().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("{}", "─".repeat(24).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a success message
pub fn success(text: &str) {
    println!("{} {}", "✔".green().bold(), text.green());
}

/// Print an info message
pub fn info(text: &str) {
    println!("{} {}", "ℹ".blue().bold(), text);
}

/// Print an error message
pub fn error(text: &str) {
    eprintln!("{} {}", "✖".red().bold(), text.red());
}

/// Print a newline
pub fn newline() {
    println!();
}

/// Print the counters and outcome of a run
pub fn summary(tracker: &RunTracker) {
    newline();
    kv("Total", &tracker.total_count().to_string());
    kv("Executed", &tracker.executed_count().to_string());
    kv("Skipped", &tracker.skip_count().to_string());
    newline();

    if !tracker.has_error() {
        success("Change log applied successfully");
        return;
    }
    let message = tracker.error_message().unwrap_or_default();
    match tracker.errored_change_set_id() {
        Some(id) => error(&format!("Changeset '{}' failed: {}", id, message)),
        None => error(message),
    }
}
