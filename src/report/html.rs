//! Self-contained HTML status page.

use std::fmt::Write;

use super::Report;

const STYLE: &str = r#"
  body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", sans-serif; margin: 2rem; background: #0f1115; color: #e6e6e6; }
  h1 { font-size: 1.4rem; margin-bottom: 0.25rem; }
  .meta { color: #8b949e; font-size: 0.85rem; margin-bottom: 1rem; }
  .pill { display: inline-block; padding: 0.2rem 0.7rem; border-radius: 999px; margin-right: 0.5rem; font-weight: 600; }
  .pill.pass { background: #1f6f3f; }
  .pill.fail { background: #8b1e1e; }
  .pill.total { background: #30363d; }
  table { border-collapse: collapse; width: 100%; margin-top: 1rem; }
  th, td { text-align: left; padding: 0.4rem 0.6rem; border-bottom: 1px solid #30363d; font-size: 0.9rem; }
  th { color: #8b949e; font-weight: 600; }
  td.ok { color: #3fb950; }
  td.fail { color: #f85149; }
  td.response { color: #8b949e; font-family: ui-monospace, monospace; }
"#;

pub fn render_html(report: &Report) -> String {
    let mut out = String::new();
    let generated = report.generated_at_display();

    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    out.push_str("<meta charset=\"utf-8\">\n<title>Model Status</title>\n");
    let _ = writeln!(out, "<style>{}</style>", STYLE);
    out.push_str("</head>\n<body>\n<h1>Model Status</h1>\n");
    let _ = writeln!(
        out,
        "<div class=\"meta\">Generated {} &middot; run {}</div>",
        escape_html(&generated),
        escape_html(&report.run_id.to_string())
    );

    let _ = writeln!(
        out,
        "<div><span class=\"pill pass\">{} passed</span><span class=\"pill fail\">{} failed</span><span class=\"pill total\">{} total</span></div>",
        report.summary.passed, report.summary.failed, report.summary.total
    );

    if report.results.is_empty() {
        out.push_str("<p>No results.</p>\n");
    } else {
        out.push_str("<table>\n<thead><tr><th>Provider</th><th>Model</th><th>Status</th><th>Latency</th><th>Via</th><th>Response</th></tr></thead>\n<tbody>\n");
        for r in &report.results {
            let class = if r.success { "ok" } else { "fail" };
            let latency = r
                .latency_ms()
                .map(|ms| format!("{} ms", ms))
                .unwrap_or_else(|| "&ndash;".to_string());
            let _ = writeln!(
                out,
                "<tr><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td>{}</td><td>{}</td><td class=\"response\">{}</td></tr>",
                escape_html(&r.provider),
                escape_html(&r.model),
                class,
                escape_html(&r.status_label()),
                latency,
                r.strategy.as_str(),
                escape_html(&r.snippet),
            );
        }
        out.push_str("</tbody>\n</table>\n");
    }

    out.push_str("</body>\n</html>\n");
    out
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
