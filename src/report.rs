// ABOUTME: Human-readable rendering of comparison results and live connections
// ABOUTME: Builds aligned text tables and emits them line by line through tracing

use crate::catalog::LiveConnection;
use crate::diff::{ComparisonReport, DiffResult, DiffRow, IndexDiff, SequenceDiff};
use crate::utils::sanitize_identifier;

/// Plain text table with a header row and `|`-separated, padded columns
#[derive(Debug, Clone)]
pub struct TextTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn lines(&self) -> Vec<String> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let len = cell.chars().count();
                match widths.get_mut(i) {
                    Some(width) => *width = (*width).max(len),
                    None => widths.push(len),
                }
            }
        }

        let format_row = |cells: &[String]| -> String {
            let padded: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, width)| {
                    let cell = cells.get(i).map(String::as_str).unwrap_or("");
                    format!("{:<width$}", cell, width = *width)
                })
                .collect();
            format!("| {} |", padded.join(" | "))
        };
        let separator = format!(
            "+-{}-+",
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-")
        );

        let mut lines = vec![separator.clone(), format_row(&self.headers), separator.clone()];
        for row in &self.rows {
            lines.push(format_row(row));
        }
        lines.push(separator);
        lines
    }

    pub fn log(&self) {
        for line in self.lines() {
            tracing::info!("{}", line);
        }
    }
}

fn headers(first: &str, source_host: &str, destination_host: &str) -> [String; 4] {
    [
        first.to_string(),
        format!("Source: {}", host_tag(source_host)),
        format!("Destination: {}", host_tag(destination_host)),
        "Equal".to_string(),
    ]
}

/// Short host prefix used in column headers
fn host_tag(host: &str) -> String {
    host.chars().take(4).collect()
}

fn row_cells(row: &DiffRow) -> Vec<String> {
    vec![
        sanitize_identifier(&row.name),
        row.source.to_string(),
        row.destination.to_string(),
        row.equal.to_string(),
    ]
}

/// Table of one DiffResult's rows
pub fn diff_table(
    result: &DiffResult,
    title: &str,
    source_host: &str,
    destination_host: &str,
) -> TextTable {
    let mut table = TextTable::new(headers(title, source_host, destination_host));
    for row in &result.rows {
        table.push(row_cells(row));
    }
    table
}

pub fn index_table(diff: &IndexDiff, source_host: &str, destination_host: &str) -> TextTable {
    let mut table = TextTable::new(headers("Index Count", source_host, destination_host));
    table.push(vec![
        String::new(),
        diff.source_total.to_string(),
        diff.destination_total.to_string(),
        diff.totals_equal.to_string(),
    ]);
    for row in &diff.result.rows {
        table.push(row_cells(row));
    }
    table
}

pub fn sequence_table(
    diff: &SequenceDiff,
    source_host: &str,
    destination_host: &str,
) -> TextTable {
    let mut table = TextTable::new(headers("Sequence Count", source_host, destination_host));
    table.push(vec![
        String::new(),
        diff.source_count.to_string(),
        diff.destination_count.to_string(),
        diff.counts_equal.to_string(),
    ]);
    for row in &diff.result.rows {
        table.push(row_cells(row));
    }
    table
}

pub fn connections_table(connections: &[LiveConnection]) -> TextTable {
    let mut table = TextTable::new([
        "Pid",
        "Username",
        "DBname",
        "ClientAddress",
        "State",
        "Query",
    ]);
    for connection in connections {
        let text = |value: &Option<String>| {
            value
                .as_deref()
                .map(sanitize_identifier)
                .unwrap_or_default()
        };
        table.push(vec![
            connection.pid.to_string(),
            text(&connection.username),
            text(&connection.database),
            text(&connection.client_address),
            text(&connection.state),
            text(&connection.query),
        ]);
    }
    table
}

/// Log the live sessions of one database
pub fn log_connections(label: &str, connections: &[LiveConnection]) {
    tracing::info!(server = %label, "Live connections: {}", connections.len());
    if !connections.is_empty() {
        connections_table(connections).log();
    }
}

/// Log every section of a comparison followed by the summary block
pub fn log_report(report: &ComparisonReport, source_host: &str, destination_host: &str) {
    tracing::info!("");
    diff_table(&report.tables, "Table Name", source_host, destination_host).log();
    index_table(&report.indexes, source_host, destination_host).log();
    for (index, definition) in &report.indexes.definitions {
        tracing::info!("Missing index {}: {}", sanitize_identifier(index), definition);
    }
    sequence_table(&report.sequences, source_host, destination_host).log();
    diff_table(&report.views, "View Name", source_host, destination_host).log();
    diff_table(&report.functions, "Function", source_host, destination_host).log();
    diff_table(
        &report.statistics,
        "Extra Comparison Items",
        source_host,
        destination_host,
    )
    .log();

    for result in [
        &report.tables,
        &report.indexes.result,
        &report.sequences.result,
        &report.views,
        &report.functions,
        &report.statistics,
    ] {
        for failure in &result.failures {
            tracing::error!(
                "  ✗ {} {} ({}): {}",
                result.kind,
                sanitize_identifier(&failure.name),
                failure.side,
                failure.error
            );
        }
    }

    tracing::info!("");
    tracing::info!("========================================");
    tracing::info!("Comparison Summary");
    tracing::info!("========================================");
    for (name, result) in [
        ("Tables", &report.tables),
        ("Indexes", &report.indexes.result),
        ("Sequences", &report.sequences.result),
        ("Views", &report.views),
        ("Functions", &report.functions),
        ("Statistics", &report.statistics),
    ] {
        tracing::info!(
            "{}: {} compared, {} equal, {} missing, {} failed",
            name,
            result.compared,
            result.equal,
            result.missing.len(),
            result.failures.len()
        );
    }
    tracing::info!("========================================");

    if report.is_clean() {
        tracing::info!("✓ Source and destination match");
    } else {
        tracing::warn!("⚠ Differences found between source and destination");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{Cell, ObjectKind};

    #[test]
    fn test_columns_are_aligned() {
        let mut table = TextTable::new(["Name", "Count"]);
        table.push(vec!["public.a_long_name".to_string(), "1".to_string()]);
        table.push(vec!["b".to_string(), "12345".to_string()]);
        let lines = table.lines();

        assert_eq!(lines.len(), 6);
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|l| l.chars().count() == width));
        assert_eq!(lines[1], "| Name               | Count |");
    }

    #[test]
    fn test_diff_table_cells() {
        let mut result = DiffResult::new(ObjectKind::Table, false);
        result.push_missing("public.gone", Cell::Blank);
        let table = diff_table(&result, "Table Name", "src-host", "dst-host");
        let lines = table.lines();

        assert!(lines[1].contains("Source: src-"));
        assert!(lines[1].contains("Destination: dst-"));
        assert!(lines[3].contains("NOTFOUND"));
        assert!(lines[3].contains("false"));
    }

    #[test]
    fn test_connections_table_sanitizes_query() {
        let table = connections_table(&[LiveConnection {
            pid: 42,
            query: Some("select 1;\nselect 2".to_string()),
            ..Default::default()
        }]);
        let lines = table.lines();
        assert!(lines[3].contains("select 1;select 2"));
        assert!(lines[3].starts_with("| 42"));
    }
}
