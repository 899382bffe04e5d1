//! Terminal presentation: theme, tables and progress bars.

pub mod progress;
pub mod tables;
pub mod theme;

pub use progress::{create_progress_bar, create_spinner, with_spinner};
pub use tables::{
    TableBuilder, create_benchmark_table, create_doctor_table, create_stats_table, format_bytes,
};
pub use theme::{THEME, Theme};
