//! Table output for stats, doctor and benchmark commands.

use crate::benchmark::RankingBenchmark;
use crate::storage::{DoctorCheck, IndexStats};
use comfy_table::{
    Attribute, Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
};

pub struct TableBuilder {
    table: Table,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    pub fn new() -> Self {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.apply_modifier(UTF8_ROUND_CORNERS);
        Self { table }
    }

    pub fn set_headers(mut self, headers: Vec<&str>) -> Self {
        let header_cells: Vec<Cell> = headers
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect();
        self.table.set_header(header_cells);
        self
    }

    pub fn add_row(mut self, row: Vec<String>) -> Self {
        self.table.add_row(row);
        self
    }

    fn add_cells(mut self, row: Vec<Cell>) -> Self {
        self.table.add_row(row);
        self
    }

    pub fn build(self) -> String {
        self.table.to_string()
    }
}

/// `1536` -> `1.5 KiB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.1} {unit}")
}

pub fn create_stats_table(stats: &IndexStats) -> String {
    let vectors = match stats.vector_bytes {
        Some(bytes) => format!("{} ({})", format_bytes(bytes), stats.vector_dtype),
        None => format!("none ({})", stats.vector_dtype),
    };
    let yes_no = |flag: bool| if flag { "yes" } else { "no" }.to_string();

    TableBuilder::new()
        .set_headers(vec!["Property", "Value"])
        .add_row(vec!["Commits".into(), stats.commit_count.to_string()])
        .add_row(vec!["Model".into(), stats.model.clone()])
        .add_row(vec!["Index size".into(), format_bytes(stats.index_bytes)])
        .add_row(vec!["Vectors".into(), vectors])
        .add_row(vec!["Include patch".into(), yes_no(stats.include_patch)])
        .add_row(vec!["Created".into(), stats.created_at.clone()])
        .add_row(vec!["Last updated".into(), stats.last_updated_at.clone()])
        .add_row(vec!["ANN sidecar".into(), yes_no(stats.ann_present)])
        .add_row(vec!["Loaded from".into(), stats.source.as_str().to_string()])
        .build()
}

pub fn create_doctor_table(checks: &[DoctorCheck]) -> String {
    checks
        .iter()
        .fold(
            TableBuilder::new().set_headers(vec!["Check", "Status", "Detail"]),
            |table, check| {
                let status = if check.ok {
                    Cell::new("ok").fg(Color::Green)
                } else {
                    Cell::new("fail").fg(Color::Red).add_attribute(Attribute::Bold)
                };
                table.add_cells(vec![Cell::new(check.name), status, Cell::new(&check.detail)])
            },
        )
        .build()
}

pub fn create_benchmark_table(
    result: &RankingBenchmark,
    candidates: usize,
    limit: usize,
    iterations: usize,
) -> String {
    let speedup = if result.speedup.is_finite() {
        format!("{:.2}x", result.speedup)
    } else {
        "∞".to_string()
    };
    let color = if result.speedup >= 1.0 {
        Color::Green
    } else {
        Color::Yellow
    };

    TableBuilder::new()
        .set_headers(vec!["Metric", "Value"])
        .add_row(vec!["Candidates".into(), candidates.to_string()])
        .add_row(vec!["Limit".into(), limit.to_string()])
        .add_row(vec!["Iterations".into(), iterations.to_string()])
        .add_row(vec!["Full sort".into(), format!("{:.3} ms", result.baseline_ms)])
        .add_row(vec!["Heap top-K".into(), format!("{:.3} ms", result.optimised_ms)])
        .add_cells(vec![
            Cell::new("Speedup"),
            Cell::new(speedup).fg(color).add_attribute(Attribute::Bold),
        ])
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_builder() {
        let table = TableBuilder::new()
            .set_headers(vec!["Column 1", "Column 2"])
            .add_row(vec!["Value 1".to_string(), "Value 2".to_string()])
            .build();

        assert!(table.contains("Column 1"));
        assert!(table.contains("Value 1"));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn test_benchmark_table_infinite_speedup() {
        let result = RankingBenchmark {
            baseline_ms: 1.5,
            optimised_ms: 0.0,
            speedup: f64::INFINITY,
        };
        let table = create_benchmark_table(&result, 100, 10, 5);
        assert!(table.contains("∞"));
        assert!(table.contains("1.500 ms"));
    }
}
