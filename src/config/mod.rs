use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct ConfigFile {
    pub api_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub max_net_price: Option<u32>,
    #[serde(alias = "min_grad")]
    pub min_grad_rate: Option<u32>,
    pub min_retention: Option<u32>,
    pub top_n: Option<u32>,
    #[serde(alias = "msi")]
    pub msi_preferences: Option<Vec<String>>,
    #[serde(alias = "state")]
    pub preferred_state: Option<String>,
    pub focus_pell: Option<bool>,
    pub dashboard_1: Option<String>,
    pub dashboard_2: Option<String>,
    pub filter_param: Option<String>,
    pub output: Option<String>,
    pub output_format: Option<String>,
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
    Some(home_dir()?.join(".collegerec").join("config.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().to_string()
}

pub fn parse_config(contents: &str, origin: &Path) -> Result<ConfigFile, String> {
    if contents.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str::<ConfigFile>(contents)
        .map_err(|e| format!("failed to parse config '{}': {e}", origin.display()))
}

pub fn load_config(path: &Path, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents, path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

fn default_config_yaml() -> String {
    r#"# collegerec config
#
# Location (default):
#   ~/.collegerec/config.yml
#
# Every key is optional; command-line flags take precedence.

# Recommendation service
api_url: http://127.0.0.1:5000/
timeout_ms: 30000

# Search defaults
max_net_price: 25000
min_grad_rate: 40
min_retention: 70
top_n: 10
# msi_preferences: [HSI, HBCU]
# preferred_state: CA
focus_pell: false

# Dashboards
dashboard_1: https://public.tableau.com/views/ProccessedBook/Dashboard1
dashboard_2: https://public.tableau.com/views/ProccessedBook/Dashboard2
filter_param: Institution Name

# Output (optional)
# output: ./recommendations.html
# output_format: html
no_color: false
"#
    .to_string()
}

pub fn ensure_default_config_file(path: &Path) -> Result<bool, String> {
    if path.exists() {
        return Ok(false);
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
    Ok(true)
}
