use anyhow::{bail, Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use ::time::{format_description::well_known, macros::format_description, OffsetDateTime};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::types::{Endpoint, ReportEntry, RunStatus, ScanReport};

#[derive(Debug, Default)]
struct SinkState {
    entries: Vec<ReportEntry>,
    log: Option<File>,
    finalized: bool,
}

/// Shared, append-only collection of confirmed logins.
///
/// When opened with a log path, each entry is also appended to that file as a
/// JSON line the moment it is recorded, so a killed run still leaves results.
#[derive(Debug, Default)]
pub struct ReportSink {
    state: Mutex<SinkState>,
}

impl ReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that mirrors every entry to `path`. Failing to open it is fatal.
    pub fn with_log(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open report log: {}", path.display()))?;
        Ok(Self {
            state: Mutex::new(SinkState {
                log: Some(file),
                ..SinkState::default()
            }),
        })
    }

    pub async fn record(&self, endpoint: &Endpoint, username: &str, password: &str) {
        let entry = ReportEntry {
            endpoint: endpoint.base_url(),
            username: username.to_string(),
            password: password.to_string(),
            timestamp: now_iso_like(),
        };
        let line = serde_json::to_string(&entry).ok();

        let mut state = self.state.lock().await;
        if let (Some(file), Some(line)) = (state.log.as_mut(), line) {
            if let Err(e) = writeln!(file, "{line}") {
                warn!(error = %e, "failed to append to report log");
            }
        }
        state.entries.push(entry);
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Take the accumulated entries, in arrival order. Only valid once per run.
    pub async fn finalize(&self) -> Result<Vec<ReportEntry>> {
        let mut state = self.state.lock().await;
        if state.finalized {
            bail!("report sink already finalized");
        }
        state.finalized = true;
        if let Some(file) = state.log.as_mut() {
            if let Err(e) = file.flush() {
                warn!(error = %e, "failed to flush report log");
            }
        }
        Ok(std::mem::take(&mut state.entries))
    }
}

/// Render the HTML report: summary, result table and footer.
pub fn render_html(report: &ScanReport) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<title>Basic auth scan results</title>\n");
    out.push_str(
        "<style>body{font-family:sans-serif}table{border-collapse:collapse}\
         td,th{border:1px solid #999;padding:4px 8px}</style>\n",
    );
    out.push_str("</head>\n<body>\n");
    out.push_str(&format!(
        "<h2>Total tested elements: {}</h2>\n",
        report.endpoints_total
    ));
    if report.status == RunStatus::Cancelled {
        out.push_str("<h2>Execution stopped by user!!!</h2>\n");
    }
    out.push_str("<table>\n<tr><th>Host</th><th>Username</th><th>Password</th></tr>\n");
    for e in &report.entries {
        let host = escape_html(&e.endpoint);
        out.push_str(&format!(
            "<tr><td><a href=\"{host}\" target=\"_blank\">{host}</a></td><td>{}</td><td>{}</td></tr>\n",
            escape_html(&e.username),
            escape_html(&e.password),
        ));
    }
    out.push_str("</table>\n");
    out.push_str(&format!(
        "<br><br><div>Report generated by {} v{} on {}</div>\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        escape_html(&report.finished_at),
    ));
    out.push_str("</body>\n</html>\n");
    out
}

pub fn write_html(path: &Path, report: &ScanReport) -> Result<()> {
    std::fs::write(path, render_html(report))
        .with_context(|| format!("failed to write HTML report: {}", path.display()))?;
    info!(path = %path.display(), "wrote HTML report");
    Ok(())
}

pub fn write_json(path: &Path, report: &ScanReport) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create JSON report: {}", path.display()))?;
    serde_json::to_writer_pretty(file, report)?;
    info!(path = %path.display(), "wrote JSON report");
    Ok(())
}

/// File stem for this run's outputs, e.g. `results2026-10-18-20-51`.
pub fn report_file_stem(now: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day]-[hour]-[minute]");
    let stamp = now
        .format(fmt)
        .unwrap_or_else(|_| String::from("1970-01-01-00-00"));
    format!("results{stamp}")
}

pub fn now_iso_like() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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
