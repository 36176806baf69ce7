//! Plain-text status table for the terminal.

use std::fmt::Write;

use super::Report;
use crate::strategies::truncate_chars;

/// Widest the RESPONSE column gets before truncation.
pub const RESPONSE_WIDTH: usize = 80;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";
const SEP: &str = "  ";

pub fn render_table(report: &Report, color: bool) -> String {
    let mut out = String::new();
    let summary = format!(
        "Summary: {} PASSED, {} FAILED",
        report.summary.passed, report.summary.failed
    );

    if report.results.is_empty() {
        out.push_str("No results.\n");
        out.push_str(&summary);
        out.push('\n');
        return out;
    }

    let rows: Vec<[String; 4]> = report
        .results
        .iter()
        .map(|r| {
            [
                r.provider.clone(),
                r.model.clone(),
                r.status_label(),
                clip(&r.snippet, RESPONSE_WIDTH),
            ]
        })
        .collect();

    let headers = ["PROVIDER", "MODEL", "STATUS", "RESPONSE"];
    let mut widths = headers.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let rule = "-".repeat(widths.iter().sum::<usize>() + SEP.len() * (widths.len() - 1));

    let _ = writeln!(out, "{}", rule);
    let header: Vec<String> = headers
        .iter()
        .zip(widths)
        .map(|(h, w)| pad(h, w))
        .collect();
    let _ = writeln!(out, "{}", header.join(SEP).trim_end());
    let _ = writeln!(out, "{}", rule);

    for (row, result) in rows.iter().zip(&report.results) {
        let mut cells: Vec<String> = row.iter().zip(widths).map(|(c, w)| pad(c, w)).collect();
        if color {
            let tint = if result.success { GREEN } else { RED };
            cells[2] = format!("{}{}{}", tint, cells[2], RESET);
        }
        let _ = writeln!(out, "{}", cells.join(SEP).trim_end());
    }

    let _ = writeln!(out, "{}", rule);
    out.push_str(&summary);
    out.push('\n');
    out
}

/// Left-align in `width` display characters.
fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    let mut s = text.to_string();
    s.extend(std::iter::repeat(' ').take(width.saturating_sub(len)));
    s
}

/// Cut to `limit` characters, marking the cut with `...`.
fn clip(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    format!("{}...", truncate_chars(text, limit.saturating_sub(3)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::{fixed_time, result, sample};
    use crate::strategies::ProbeStatus;
    use uuid::Uuid;

    #[test]
    fn test_table_layout() {
        let table = render_table(&sample(), false);
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[0].chars().all(|c| c == '-'));
        assert!(lines[1].starts_with("PROVIDER  MODEL  STATUS"));
        assert!(lines[1].ends_with("RESPONSE"));
        assert_eq!(lines[2], lines[0]);
        assert!(lines[3].starts_with("acme      m2     http-error-401"));
        assert_eq!(lines.last().copied(), Some("Summary: 2 PASSED, 2 FAILED"));
        assert!(!table.contains('\x1b'));
    }

    #[test]
    fn test_color_wraps_status_only() {
        let table = render_table(&sample(), true);
        assert!(table.contains(RED));
        assert!(table.contains(GREEN));
        assert!(table.lines().next().unwrap().chars().all(|c| c == '-'));
    }

    #[test]
    fn test_long_response_is_clipped() {
        let long = "x".repeat(200);
        let report = crate::report::Report::build(
            vec![result("acme", "m1", ProbeStatus::HttpError(500), &long)],
            fixed_time(),
            Uuid::nil(),
        );
        let table = render_table(&report, false);
        let row = table.lines().nth(3).unwrap();
        assert!(row.ends_with("..."));
        let response = row.rsplit(SEP).next().unwrap();
        assert_eq!(response.chars().count(), RESPONSE_WIDTH);
    }

    #[test]
    fn test_empty_table() {
        let report = crate::report::Report::build(Vec::new(), fixed_time(), Uuid::nil());
        assert_eq!(render_table(&report, true), "No results.\nSummary: 0 PASSED, 0 FAILED\n");
    }

    #[test]
    fn test_clip() {
        assert_eq!(clip("short", 80), "short");
        assert_eq!(clip("abcdefghij", 6), "abc...");
    }
}
