//! Human- and machine-readable summaries of a run's traffic table.

use crate::run_date::RunDate;
use crate::traffic::{TrafficCounters, TrafficTable};
use serde::Serialize;
use std::io::Write;

/// Report rendering selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Format bytes as a human-readable size: `512 B`, `1.2 GB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for u in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = u;
    }
    format!("{value:.1} {unit}")
}

/// Render the text report: one line per project, then a total.
pub fn render_text(date: &RunDate, table: &TrafficTable) -> String {
    let width = table
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0)
        .max("total".len());

    let mut out = format!("Mirror traffic for {date}\n");
    for (name, c) in table.iter() {
        out.push_str(&text_line(name, c, width));
    }
    out.push_str(&text_line("total", table.total(), width));
    out
}

fn text_line(name: &str, c: TrafficCounters, width: usize) -> String {
    format!(
        "{name:<width$}  up {:>10}  down {:>10}\n",
        format_bytes(c.up),
        format_bytes(c.down)
    )
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    date: chrono::NaiveDate,
    projects: Vec<JsonProject<'a>>,
    total: TrafficCounters,
}

#[derive(Debug, Serialize)]
struct JsonProject<'a> {
    project: &'a str,
    up: u64,
    down: u64,
}

/// Render the JSON report.
pub fn render_json(date: &RunDate, table: &TrafficTable) -> serde_json::Result<String> {
    let report = JsonReport {
        date: date.date(),
        projects: table
            .iter()
            .map(|(project, c)| JsonProject {
                project,
                up: c.up,
                down: c.down,
            })
            .collect(),
        total: table.total(),
    };
    serde_json::to_string_pretty(&report)
}

/// Write the report in the chosen format to `out`.
pub fn print<W: Write>(
    out: &mut W,
    format: ReportFormat,
    date: &RunDate,
    table: &TrafficTable,
) -> std::io::Result<()> {
    let rendered = match format {
        ReportFormat::Text => render_text(date, table),
        ReportFormat::Json => {
            let mut json = render_json(date, table).map_err(std::io::Error::other)?;
            json.push('\n');
            json
        }
    };
    out.write_all(rendered.as_bytes())?;
    out.flush()
}
