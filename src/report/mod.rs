//! Run report — sorted results plus pass/fail counts, and the JSON
//! payload written next to the HTML page.
//!
//! Building a report is pure: the same results, timestamp and run id
//! always render to the same bytes.

use chrono::{DateTime, Local};
use serde::Serialize;
use uuid::Uuid;

use crate::strategies::ProbeResult;

pub mod html;
pub mod table;

pub use html::render_html;
pub use table::render_table;

/// Timestamp layout shared by the JSON payload, the table and the page.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
    pub generated_at: DateTime<Local>,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub run_id: Uuid,
    pub summary: RunSummary,
    /// Failures first, then by provider and model.
    pub results: Vec<ProbeResult>,
}

impl Report {
    pub fn build(mut results: Vec<ProbeResult>, generated_at: DateTime<Local>, run_id: Uuid) -> Self {
        results.sort_by(|a, b| {
            (a.success, &a.provider, &a.model).cmp(&(b.success, &b.provider, &b.model))
        });

        let passed = results.iter().filter(|r| r.success).count();
        let total = results.len();

        Self {
            run_id,
            summary: RunSummary {
                passed,
                failed: total - passed,
                total,
                generated_at,
            },
            results,
        }
    }

    pub fn generated_at_display(&self) -> String {
        self.summary.generated_at.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn to_payload(&self) -> ReportPayload<'_> {
        ReportPayload {
            run_id: self.run_id.to_string(),
            generated_at: self.generated_at_display(),
            summary: SummaryPayload {
                passed: self.summary.passed,
                failed: self.summary.failed,
                total: self.summary.total,
            },
            results: self.results.iter().map(ResultPayload::from).collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.to_payload())
    }
}

// ── JSON Payload ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ReportPayload<'a> {
    pub run_id: String,
    pub generated_at: String,
    pub summary: SummaryPayload,
    pub results: Vec<ResultPayload<'a>>,
}

#[derive(Debug, Serialize)]
pub struct SummaryPayload {
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ResultPayload<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    pub success: bool,
    pub status: String,
    pub category: &'static str,
    pub latency_ms: Option<u64>,
    pub via: &'static str,
    pub stage: &'static str,
    pub response: &'a str,
}

impl<'a> From<&'a ProbeResult> for ResultPayload<'a> {
    fn from(r: &'a ProbeResult) -> Self {
        Self {
            provider: &r.provider,
            model: &r.model,
            success: r.success,
            status: r.status_label(),
            category: r.status.category().as_str(),
            latency_ms: r.latency_ms(),
            via: r.strategy.as_str(),
            stage: r.stage.as_str(),
            response: &r.snippet,
        }
    }
}
