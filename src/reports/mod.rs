use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Readiness,
    GapAnalysis,
    ContinuousMonitoring,
    ExecutiveSummary,
    TechnicalReport,
    AuditorReport,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportView {
    Executive,
    Technical,
    Auditor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Ready,
    Generating,
    Pending,
    Failed,
}

impl ReportType {
    pub const ALL: [ReportType; 6] = [
        ReportType::Readiness,
        ReportType::GapAnalysis,
        ReportType::ContinuousMonitoring,
        ReportType::ExecutiveSummary,
        ReportType::TechnicalReport,
        ReportType::AuditorReport,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportType::Readiness => "readiness",
            ReportType::GapAnalysis => "gap_analysis",
            ReportType::ContinuousMonitoring => "continuous_monitoring",
            ReportType::ExecutiveSummary => "executive_summary",
            ReportType::TechnicalReport => "technical_report",
            ReportType::AuditorReport => "auditor_report",
        }
    }
}

impl ReportView {
    pub const ALL: [ReportView; 3] = [
        ReportView::Executive,
        ReportView::Technical,
        ReportView::Auditor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportView::Executive => "executive",
            ReportView::Technical => "technical",
            ReportView::Auditor => "auditor",
        }
    }
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 4] = [
        ReportStatus::Ready,
        ReportStatus::Generating,
        ReportStatus::Pending,
        ReportStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Ready => "ready",
            ReportStatus::Generating => "generating",
            ReportStatus::Pending => "pending",
            ReportStatus::Failed => "failed",
        }
    }
}

macro_rules! impl_label {
    ($ty:ident, $kind:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let wanted = value.trim().to_lowercase().replace('-', "_");
                $ty::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| {
                        let expected = $ty::ALL
                            .iter()
                            .map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(", ");
                        format!(
                            "unknown {} '{}', expected one of: {}",
                            $kind,
                            value.trim(),
                            expected
                        )
                    })
            }
        }
    };
}

impl_label!(ReportType, "report type");
impl_label!(ReportView, "report view");
impl_label!(ReportStatus, "report status");

/// A generated compliance report as exported by the dashboard backend.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub report_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub view: ReportView,
    pub status: ReportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    #[serde(default)]
    pub framework_names: Vec<String>,
    #[serde(default, deserialize_with = "share_count_or_zero")]
    pub share_count: u64,
}

fn share_count_or_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(0))
}

impl Report {
    fn matches_query(&self, lowered_query: &str) -> bool {
        let contains = |field: &str| field.to_lowercase().contains(lowered_query);
        contains(&self.report_id)
            || contains(&self.name)
            || self.description.as_deref().is_some_and(contains)
            || self.framework_names.iter().any(|name| contains(name.as_str()))
            || self.template_name.as_deref().is_some_and(contains)
    }
}

/// One filter selector: either the "all" sentinel or a concrete value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector<T> {
    All,
    Only(T),
}

impl<T> Default for Selector<T> {
    fn default() -> Self {
        Selector::All
    }
}

impl<T: PartialEq> Selector<T> {
    pub fn admits(&self, value: &T) -> bool {
        match self {
            Selector::All => true,
            Selector::Only(wanted) => wanted == value,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selector::All)
    }
}

impl<T: FromStr> FromStr for Selector<T> {
    type Err = T::Err;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(Selector::All);
        }
        value.parse::<T>().map(Selector::Only)
    }
}

impl<T: fmt::Display> fmt::Display for Selector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => f.write_str("all"),
            Selector::Only(v) => fmt::Display::fmt(v, f),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterState {
    pub query: String,
    pub status: Selector<ReportStatus>,
    pub report_type: Selector<ReportType>,
    pub view: Selector<ReportView>,
    pub framework: Selector<String>,
}

impl FilterState {
    pub fn admits(&self, report: &Report) -> bool {
        self.admits_lowered(report, &self.query.to_lowercase())
    }

    // `lowered_query` is `self.query` already lowercased by the caller.
    fn admits_lowered(&self, report: &Report, lowered_query: &str) -> bool {
        if !lowered_query.is_empty() && !report.matches_query(lowered_query) {
            return false;
        }
        if !self.status.admits(&report.status) {
            return false;
        }
        if !self.report_type.admits(&report.report_type) {
            return false;
        }
        if !self.view.admits(&report.view) {
            return false;
        }
        match &self.framework {
            Selector::All => true,
            Selector::Only(name) => report.framework_names.iter().any(|n| n == name),
        }
    }
}

/// Returns the reports admitted by `state`, in collection order.
pub fn filter<'a>(reports: &'a [Report], state: &FilterState) -> Vec<&'a Report> {
    let lowered_query = state.query.to_lowercase();
    reports
        .iter()
        .filter(|r| state.admits_lowered(r, &lowered_query))
        .collect()
}

pub fn distinct_frameworks(reports: &[Report]) -> Vec<String> {
    reports
        .iter()
        .flat_map(|r| r.framework_names.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub ready: usize,
    pub generating: usize,
    pub pending: usize,
    pub failed: usize,
    pub total_shares: u64,
}

pub fn summarize(reports: &[Report]) -> ReportSummary {
    let mut summary = ReportSummary {
        total: reports.len(),
        ..ReportSummary::default()
    };
    for r in reports {
        match r.status {
            ReportStatus::Ready => summary.ready += 1,
            ReportStatus::Generating => summary.generating += 1,
            ReportStatus::Pending => summary.pending += 1,
            ReportStatus::Failed => summary.failed += 1,
        }
        summary.total_shares += r.share_count;
    }
    summary
}

/// Immutable report collection with its collection-level aggregates.
///
/// The summary and framework option list are computed once here; filtering
/// only borrows the collection and never invalidates them.
#[derive(Clone, Debug, Default)]
pub struct ReportCatalog {
    reports: Vec<Report>,
    summary: ReportSummary,
    frameworks: Vec<String>,
}

impl ReportCatalog {
    pub fn new(reports: Vec<Report>) -> Self {
        let summary = summarize(&reports);
        let frameworks = distinct_frameworks(&reports);
        Self {
            reports,
            summary,
            frameworks,
        }
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn summary(&self) -> ReportSummary {
        self.summary
    }

    pub fn frameworks(&self) -> &[String] {
        &self.frameworks
    }

    pub fn filter(&self, state: &FilterState) -> Vec<&Report> {
        filter(&self.reports, state)
    }
}

/// Ids of the reports the user has ticked, in the order they were ticked.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<String>,
}

impl Selection {
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|i| i == id)
    }

    pub fn toggle(&mut self, id: &str) {
        if let Some(pos) = self.ids.iter().position(|i| i == id) {
            self.ids.remove(pos);
        } else {
            self.ids.push(id.to_string());
        }
    }

    // Compares lengths only, so a stale selection of the same size clears.
    pub fn toggle_all(&mut self, visible: &[&Report]) {
        if self.ids.len() == visible.len() {
            self.ids.clear();
        } else {
            self.ids = visible.iter().map(|r| r.id.clone()).collect();
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportsError {
    #[error("failed to read reports file: {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse reports file: {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub fn parse_reports(raw: &str) -> Result<Vec<Report>, serde_json::Error> {
    serde_json::from_str::<Vec<Report>>(raw)
}

pub async fn load_reports(path: &Path) -> Result<Vec<Report>, ReportsError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ReportsError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
    let reports = parse_reports(&raw).map_err(|e| ReportsError::Parse {
        path: path.display().to_string(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), count = reports.len(), "loaded reports");
    Ok(reports)
}
