//! Field sanitization applied before rows reach the CSV file
//!
//! Line breaks are collapsed so every record stays on one line, and text
//! that a spreadsheet would read as a formula is prefixed with a quote.

use regex::Regex;
use std::sync::LazyLock;

use crate::data_merger::JoinedRow;

static LINE_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\r\n]+").expect("valid line break pattern"));

/// Leading characters spreadsheet software treats as a formula
const FORMULA_PREFIXES: [char; 4] = ['=', '+', '@', '-'];

pub fn sanitize_field(value: &str) -> String {
    let collapsed = LINE_BREAKS.replace_all(value, " ");
    let trimmed = collapsed.trim();

    if trimmed.starts_with(FORMULA_PREFIXES) {
        format!("'{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

pub fn sanitize_row(row: JoinedRow) -> JoinedRow {
    JoinedRow {
        name: sanitize_field(&row.name),
        title: sanitize_field(&row.title),
        body: sanitize_field(&row.body),
    }
}
