//! Presentation of CSV query results: a row preview and a rough column analysis.
//!
//! Columns are recognised by substrings of their header names. The totals
//! are a convenience summary and saturate instead of overflowing.

use std::collections::HashSet;
use std::fmt::{self, Write as FmtWrite};

use csv::{ReaderBuilder, StringRecord};

use crate::cost::format_number;

const MAX_LINE_WIDTH: usize = 120;
const MAX_LISTED_ENTITIES: usize = 10;

fn non_blank_lines(content: &str) -> Vec<&str> {
    content.lines().filter(|l| !l.trim().is_empty()).collect()
}

/// Header and the first `rows` data lines, long lines truncated
pub fn format_preview(content: &str, rows: usize) -> String {
    let lines = non_blank_lines(content);
    let Some((header, data)) = lines.split_first() else {
        return String::new();
    };
    if data.is_empty() {
        return String::new();
    }

    let mut output = String::new();
    let _ = writeln!(output, "Preview (first {} rows):", rows);
    let _ = writeln!(output, "{}", "=".repeat(80));
    let _ = writeln!(output, "{}", header);
    let _ = writeln!(output, "{}", "-".repeat(80));

    for (i, line) in data.iter().take(rows).enumerate() {
        let _ = writeln!(output, "{:>2}: {}", i + 1, truncate_line(line, MAX_LINE_WIDTH));
    }

    if data.len() > rows {
        let _ = writeln!(output, "    ... and {} more rows", data.len() - rows);
    }

    output
}

fn truncate_line(line: &str, max_chars: usize) -> String {
    if line.chars().count() <= max_chars {
        line.to_string()
    } else {
        let head: String = line.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

/// Summary of recognisable columns in a CSV result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
    pub rows: usize,
    /// Distinct values of the first user/client column
    pub entities: Option<Vec<String>>,
    /// Sum of the first count/total/sum column
    pub metric_total: Option<i64>,
    /// Distinct values of the first date/timestamp column
    pub time_points: Option<usize>,
}

/// Analyse CSV content; `None` when there is no data row
pub fn analyze(content: &str) -> Option<Analysis> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .ok()?
        .iter()
        .map(str::to_lowercase)
        .collect();
    let rows: Vec<StringRecord> = reader
        .records()
        .filter_map(|r| r.ok())
        .filter(|r| r.iter().any(|v| !v.trim().is_empty()))
        .collect();
    if rows.is_empty() {
        return None;
    }

    let find_column = |needles: &[&str]| {
        columns
            .iter()
            .position(|c| needles.iter().any(|n| c.contains(n)))
    };

    let entities = find_column(&["user", "client"]).map(|idx| {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for value in rows.iter().filter_map(|r| cell(r, idx)) {
            if seen.insert(value) {
                ordered.push(value.to_string());
            }
        }
        ordered
    });

    let metric_total = find_column(&["count", "total", "sum"]).map(|idx| {
        rows.iter()
            .filter_map(|r| cell(r, idx))
            .filter_map(leading_integer)
            .fold(0i64, i64::saturating_add)
    });

    let time_points = find_column(&["date", "timestamp"]).map(|idx| {
        rows.iter()
            .filter_map(|r| cell(r, idx))
            .collect::<HashSet<_>>()
            .len()
    });

    Some(Analysis {
        rows: rows.len(),
        entities,
        metric_total,
        time_points,
    })
}

fn cell(row: &StringRecord, idx: usize) -> Option<&str> {
    row.get(idx).filter(|v| !v.is_empty())
}

/// Integer prefix of a cell, so `"12.5"` counts as 12 and `"abc"` as nothing
fn leading_integer(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    let end = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    trimmed.get(..end)?.parse().ok()
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Results: {} rows", self.rows)?;

        if let Some(entities) = &self.entities {
            writeln!(f, "\nUser/Client Analysis Detected:")?;
            writeln!(f, "   Unique entities: {}", entities.len())?;
            if entities.len() <= MAX_LISTED_ENTITIES {
                writeln!(f, "   Entities: {}", entities.join(", "))?;
            }
        }

        if let Some(total) = self.metric_total {
            writeln!(f, "\nMetrics Analysis Detected:")?;
            if total > 0 {
                writeln!(f, "   Total value: {}", format_number(total.unsigned_abs()))?;
            }
        }

        if let Some(points) = self.time_points {
            writeln!(f, "\nTime Series Detected:")?;
            writeln!(f, "   Time points: {}", points)?;
        }

        Ok(())
    }
}
