use serde::Deserialize;
use serde::Serialize;

use crate::fetcher::{AuthenticatedFetcher, FetchError, Transport};
use crate::utils;

pub const DEFAULT_CATEGORY: &str = "security";
pub const DEFAULT_STATUS: &str = "not_started";

/// One element of the frameworks endpoint, as sent on the wire.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FrameworkRecord {
    #[serde(default)]
    pub id: Option<FrameworkId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub compliance_score: Option<f64>,
    #[serde(default)]
    pub total_controls: Option<u64>,
    #[serde(default)]
    pub passing_controls: Option<u64>,
    #[serde(default)]
    pub failing_controls: Option<u64>,
    #[serde(default)]
    pub not_evaluated_controls: Option<u64>,
    #[serde(default)]
    pub last_evaluated: Option<String>,
    #[serde(default)]
    pub next_audit_date: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FrameworkId {
    Text(String),
    Number(i64),
}

impl FrameworkId {
    fn into_string(self) -> String {
        match self {
            FrameworkId::Text(s) => s,
            FrameworkId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Framework {
    pub id: String,
    pub name: String,
    pub code: String,
    pub category: String,
    pub description: String,
    pub icon: String,
    pub enabled: bool,
    pub status: String,
    pub compliance_score: f64,
    pub total_controls: u64,
    pub passing_controls: u64,
    pub failing_controls: u64,
    pub not_evaluated_controls: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_evaluated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_audit_date: Option<String>,
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl TryFrom<FrameworkRecord> for Framework {
    type Error = String;

    fn try_from(record: FrameworkRecord) -> Result<Self, Self::Error> {
        let id = record
            .id
            .map(FrameworkId::into_string)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| "framework record has no id".to_string())?;
        Ok(Framework {
            id,
            name: record.name.unwrap_or_default(),
            code: record.code.unwrap_or_default(),
            category: non_empty_or(record.category, DEFAULT_CATEGORY),
            description: record.description.unwrap_or_default(),
            icon: record.icon.unwrap_or_default(),
            enabled: record.enabled.unwrap_or(true),
            status: non_empty_or(record.status, DEFAULT_STATUS),
            compliance_score: record.compliance_score.unwrap_or(0.0),
            total_controls: record.total_controls.unwrap_or(0),
            passing_controls: record.passing_controls.unwrap_or(0),
            failing_controls: record.failing_controls.unwrap_or(0),
            not_evaluated_controls: record.not_evaluated_controls.unwrap_or(0),
            last_evaluated: record.last_evaluated,
            next_audit_date: record.next_audit_date,
        })
    }
}

/// Maps a frameworks response body into [`Framework`]s.
///
/// A body that is not a JSON array is treated as "no data". Elements that do
/// not validate are dropped individually and logged.
pub fn parse_frameworks(body: &[u8]) -> Vec<Framework> {
    let items = match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Array(items)) => items,
        Ok(_) => {
            tracing::warn!("frameworks response is not an array, ignoring");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(error = %e, "frameworks response is not JSON, ignoring");
            return Vec::new();
        }
    };

    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let record = match serde_json::from_value::<FrameworkRecord>(item) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping malformed framework record");
                continue;
            }
        };
        match Framework::try_from(record) {
            Ok(framework) => out.push(framework),
            Err(reason) => tracing::warn!(index, %reason, "skipping framework record"),
        }
    }
    out
}

/// Loads the framework reference list through `fetcher`.
///
/// Without an access token there is nothing to authenticate with, so no
/// request is made and the list is empty.
pub async fn fetch_frameworks<T: Transport>(
    fetcher: &AuthenticatedFetcher<T>,
    base_url: &str,
) -> Result<Vec<Framework>, FetchError> {
    let Some(token) = fetcher.session().access_token() else {
        tracing::debug!("no access token, skipping frameworks fetch");
        return Ok(Vec::new());
    };
    let url = utils::api_url(base_url, utils::FRAMEWORKS_PATH);
    let body = fetcher.get_with_token(&url, &token).await?;
    let frameworks = parse_frameworks(&body);
    tracing::info!(count = frameworks.len(), "fetched frameworks");
    Ok(frameworks)
}
