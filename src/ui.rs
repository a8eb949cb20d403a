use colored::{ColoredString, Colorize};
use reconcile::OperationStatus;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// State and status markers
// ============================================================================

/// Glyph for an operation outcome
pub fn status_glyph(status: OperationStatus) -> ColoredString {
    match status {
        OperationStatus::Added
        | OperationStatus::Updated
        | OperationStatus::Removed
        | OperationStatus::Unlinked => "✓".green(),
        OperationStatus::WouldAdd
        | OperationStatus::WouldUpdate
        | OperationStatus::WouldRemove
        | OperationStatus::WouldUnlink => "→".cyan(),
        OperationStatus::AlreadyManaged | OperationStatus::AlreadyInstalled => "•".dimmed(),
        OperationStatus::Skipped => "⚠".yellow(),
        OperationStatus::Failed => "✗".red(),
    }
}

/// Colored status name
pub fn status_label(status: OperationStatus) -> ColoredString {
    match status {
        OperationStatus::Failed => status.as_str().red(),
        OperationStatus::Skipped => status.as_str().yellow(),
        OperationStatus::AlreadyManaged | OperationStatus::AlreadyInstalled => status.as_str().dimmed(),
        s if s.is_dry_run() => s.as_str().cyan(),
        s => s.as_str().green(),
    }
}
