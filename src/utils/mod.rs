pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const TOKEN_REFRESH_PATH: &str = "/api/token/refresh/";
pub const FRAMEWORKS_PATH: &str = "/api/compliance/frameworks/";

/// Strips a single trailing slash, matching how the dashboard joins paths.
pub fn trim_base_url(base: &str) -> &str {
    base.strip_suffix('/').unwrap_or(base)
}

pub fn api_url(base: &str, path: &str) -> String {
    format!("{}{}", trim_base_url(base.trim()), path)
}

pub fn validate_base_url(value: &str) -> Result<(), String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("base URL is empty".to_string());
    }
    let parsed = reqwest::Url::parse(trimmed).map_err(|e| e.to_string())?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported scheme '{other}'")),
    }
}

pub fn parse_timeout_seconds(value: usize) -> Result<usize, String> {
    if value == 0 {
        return Err("timeout must be a positive number of seconds".to_string());
    }
    Ok(value)
}
