use colored::{ColoredString, Colorize};
use serde::Serialize;

use crate::frameworks::Framework;
use crate::reports::{FilterState, Report, ReportStatus, ReportSummary};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewMode {
    Table,
    Card,
}

impl ViewMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "table" => Some(Self::Table),
            "card" | "cards" => Some(Self::Card),
            _ => None,
        }
    }
}

fn paint_status(status: ReportStatus, padded: String) -> ColoredString {
    match status {
        ReportStatus::Ready => padded.green(),
        ReportStatus::Generating => padded.cyan(),
        ReportStatus::Pending => padded.yellow(),
        ReportStatus::Failed => padded.red(),
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut out: String = value.chars().take(width.saturating_sub(1)).collect();
    out.push('~');
    out
}

fn render_table(reports: &[&Report]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<14} {:<32} {:<22} {:<10} {:<11} {:>6}  {}\n",
        "REPORT ID", "NAME", "TYPE", "VIEW", "STATUS", "SHARES", "FRAMEWORKS"
    ));
    for r in reports {
        out.push_str(&format!(
            "{:<14} {:<32} {:<22} {:<10} {} {:>6}  {}\n",
            truncate(&r.report_id, 14),
            truncate(&r.name, 32),
            r.report_type.as_str(),
            r.view.as_str(),
            paint_status(r.status, format!("{:<11}", r.status.as_str())),
            r.share_count,
            r.framework_names.join(", ")
        ));
    }
    out
}

fn render_cards(reports: &[&Report]) -> String {
    let mut out = String::new();
    for r in reports {
        out.push_str(&format!(
            "{} {}\n",
            r.report_id.bold(),
            paint_status(r.status, format!("[{}]", r.status.as_str()))
        ));
        out.push_str(&format!("  {}\n", r.name));
        if let Some(description) = r.description.as_deref() {
            out.push_str(&format!("  {}\n", description.dimmed()));
        }
        out.push_str(&format!(
            "  type: {}  view: {}  shares: {}\n",
            r.report_type, r.view, r.share_count
        ));
        if let Some(template) = r.template_name.as_deref() {
            out.push_str(&format!("  template: {template}\n"));
        }
        if !r.framework_names.is_empty() {
            out.push_str(&format!("  frameworks: {}\n", r.framework_names.join(", ")));
        }
        out.push('\n');
    }
    out
}

pub fn render_reports_text(reports: &[&Report], mode: ViewMode) -> String {
    if reports.is_empty() {
        return "no reports match the current filters\n".to_string();
    }
    match mode {
        ViewMode::Table => render_table(reports),
        ViewMode::Card => render_cards(reports),
    }
}

pub fn render_summary_text(summary: &ReportSummary) -> String {
    format!(
        "total: {}  {}: {}  {}: {}  {}: {}  {}: {}  shares: {}\n",
        summary.total,
        "ready".green(),
        summary.ready,
        "generating".cyan(),
        summary.generating,
        "pending".yellow(),
        summary.pending,
        "failed".red(),
        summary.failed,
        summary.total_shares
    )
}

pub fn describe_filters(state: &FilterState) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    if !state.query.trim().is_empty() {
        parts.push(format!("search={:?}", state.query));
    }
    if !state.status.is_all() {
        parts.push(format!("status={}", state.status));
    }
    if !state.report_type.is_all() {
        parts.push(format!("type={}", state.report_type));
    }
    if !state.view.is_all() {
        parts.push(format!("view={}", state.view));
    }
    if !state.framework.is_all() {
        parts.push(format!("framework={}", state.framework));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

pub fn render_framework_names_text(names: &[String]) -> String {
    let mut out = String::new();
    for name in names {
        out.push_str(name);
        out.push('\n');
    }
    out
}

pub fn render_frameworks_text(frameworks: &[Framework]) -> String {
    let mut out = String::new();
    for f in frameworks {
        let enabled = if f.enabled { "" } else { " (disabled)" };
        out.push_str(&format!(
            "{:<12} {:<32} {:<14} {:>5.1}%  {}/{} passing{}\n",
            truncate(&f.code, 12),
            truncate(&f.name, 32),
            f.status,
            f.compliance_score,
            f.passing_controls,
            f.total_controls,
            enabled
        ));
    }
    out
}

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = serde_json::to_vec_pretty(value)?;
    out.push(b'\n');
    Ok(out)
}
