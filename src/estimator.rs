//! Parsing of the byte count reported by a dry run.
//!
//! The dry run is requested with `--format=json`, but the tool does not always
//! honour it (older releases, warnings printed ahead of the report). Parsing
//! therefore tries the structured report first and falls back to scanning the
//! free text for `<number> bytes processed`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static BYTES_PROCESSED_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+(?:,\d{3})*)\s+bytes\s+processed").ok());

/// Extract the total bytes processed from dry-run output
pub fn parse_bytes_processed(raw: &str) -> Option<u64> {
    parse_structured(raw).or_else(|| parse_text(raw))
}

/// Read `totalBytesProcessed` from the JSON job report.
///
/// Valid JSON that lacks the field is a failure, not zero.
pub fn parse_structured(raw: &str) -> Option<u64> {
    let report: Value = serde_json::from_str(raw.trim()).ok()?;

    [
        report.get("totalBytesProcessed"),
        report
            .get("statistics")
            .and_then(|s| s.get("totalBytesProcessed")),
        report
            .get("statistics")
            .and_then(|s| s.get("query"))
            .and_then(|q| q.get("totalBytesProcessed")),
    ]
    .into_iter()
    .flatten()
    .find_map(bytes_from_value)
}

fn bytes_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

/// Scan free text for `12,345 bytes processed`
pub fn parse_text(raw: &str) -> Option<u64> {
    let re = BYTES_PROCESSED_RE.as_ref()?;
    let captures = re.captures(raw)?;
    let digits: String = captures.get(1)?.as_str().replace(',', "");
    digits.parse().ok()
}
