//! Colour theme for terminal output.

use console::Style;
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use std::sync::LazyLock;

pub static THEME: LazyLock<Theme> = LazyLock::new(Theme::default);

#[derive(Debug, Clone)]
pub struct Theme {
    pub success: Style,
    pub error: Style,
    pub warning: Style,
    /// Section headers
    pub header: Style,
    /// Commit subjects
    pub emphasis: Style,
    pub dim: Style,
    /// Changed files
    pub file: Style,
    /// Scores and counts
    pub number: Style,
    /// Abbreviated commit hashes
    pub hash: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            success: Style::new().green().bright(),
            error: Style::new().red().bright(),
            warning: Style::new().yellow().bright(),
            header: Style::new().cyan().bold(),
            emphasis: Style::new().bold(),
            dim: Style::new().dim(),
            file: Style::new().magenta(),
            number: Style::new().cyan(),
            hash: Style::new().yellow(),
        }
    }
}

impl Theme {
    pub fn success_with_icon(&self, text: &str) -> String {
        if Self::should_disable_colors() {
            format!("✓ {text}")
        } else {
            format!("{} {}", "✓".green(), self.success.apply_to(text))
        }
    }

    pub fn error_with_icon(&self, text: &str) -> String {
        if Self::should_disable_colors() {
            format!("✗ {text}")
        } else {
            format!("{} {}", "✗".red(), self.error.apply_to(text))
        }
    }

    pub fn warning_with_icon(&self, text: &str) -> String {
        if Self::should_disable_colors() {
            format!("⚠ {text}")
        } else {
            format!("{} {}", "⚠".yellow(), self.warning.apply_to(text))
        }
    }

    /// Plain output for pipes and when `NO_COLOR` is set.
    pub fn should_disable_colors() -> bool {
        std::env::var_os("NO_COLOR").is_some() || !std::io::stdout().is_terminal()
    }

    pub fn apply<T: std::fmt::Display>(&self, style: &Style, text: T) -> String {
        if Self::should_disable_colors() {
            text.to_string()
        } else {
            style.apply_to(text).to_string()
        }
    }
}
