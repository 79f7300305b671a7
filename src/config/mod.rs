use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

pub const BASE_URL_ENV: &str = "COMPLIANCE_API_BASE_URL";
const CONFIG_DIR: &str = ".compliance-reports";

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct ConfigFile {
    #[serde(alias = "api_base_url")]
    pub base_url: Option<String>,
    pub timeout: Option<usize>,
    pub credentials_file: Option<String>,
    pub reports_file: Option<String>,
    pub output_format: Option<String>,
    pub view_mode: Option<String>,
    pub no_color: Option<bool>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(CONFIG_DIR).join("config.yml"))
}

pub fn default_credentials_path() -> Option<PathBuf> {
    Some(home_dir()?.join(CONFIG_DIR).join("credentials.json"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) if contents.trim().is_empty() => Ok(ConfigFile::default()),
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

/// Picks the API base URL: flag, then environment, then config file.
pub fn resolve_base_url(flag: Option<String>, cfg: &ConfigFile) -> String {
    flag.or_else(|| env::var(BASE_URL_ENV).ok().filter(|v| !v.trim().is_empty()))
        .or_else(|| cfg.base_url.clone())
        .unwrap_or_else(|| crate::utils::DEFAULT_BASE_URL.to_string())
}

fn default_config_yaml() -> String {
    r#"# compliance-reports config
#
# Location (default):
#   ~/.compliance-reports/config.yml

# API (COMPLIANCE_API_BASE_URL overrides this, --base-url overrides both)
base_url: http://localhost:8000
timeout: 10

# Session
# credentials_file: ~/.compliance-reports/credentials.json

# Reports
# reports_file: ./reports.json

# Output
output_format: text
view_mode: table
no_color: false
"#
    .to_string()
}

pub fn ensure_default_config_file(path: &PathBuf) -> Result<(), String> {
    if path.exists() {
        return Ok(());
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    std::fs::write(path, default_config_yaml())
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(())
}
