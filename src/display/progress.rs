//! Progress bars for embedding runs.
//!
//! Bars draw to stderr and are hidden when stderr is not a terminal, so
//! piped output and tests stay clean.

use indicatif::{ProgressBar, ProgressStyle};
use is_terminal::IsTerminal;
use std::time::Duration;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";

fn stderr_is_terminal() -> bool {
    std::io::stderr().is_terminal()
}

/// Bar for `total` commits. Hidden off-terminal.
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    if !stderr_is_terminal() {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::default_bar()
        .template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    let pb = ProgressBar::new(total).with_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn create_spinner(message: &str) -> ProgressBar {
    if !stderr_is_terminal() {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::default_spinner()
        .template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    let spinner = ProgressBar::new_spinner().with_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Show a spinner while `operation` runs.
pub fn with_spinner<F, T>(message: &str, operation: F) -> T
where
    F: FnOnce() -> T,
{
    let spinner = create_spinner(message);
    let result = operation();
    spinner.finish_and_clear();
    result
}
