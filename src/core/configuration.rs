use serde::Deserialize;
use std::path::Path;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    pub network: Option<NetworkConfiguration>,
    pub static_files: Option<StaticFilesConfiguration>,
    pub rewrite: Option<RewriteConfiguration>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfiguration {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct StaticFilesConfiguration {
    pub path: Option<String>,
    pub remote_path: Option<String>,
    pub index: Option<String>,
}

/// Where the rewrite rules come from and how they are watched.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct RewriteConfiguration {
    /// Rule file, hot-reloaded according to `reload_interval`
    pub path: Option<String>,
    /// Inline directive document, used when `path` is absent
    pub rules: Option<String>,
    /// `directive` or `declarative`, inferred from `path` when absent
    pub dialect: Option<String>,
    /// Seconds between reload checks, negative or absent disables them
    pub reload_interval: Option<i64>,
    /// Directory resolving `-f`/`-d` conditions, defaults to the static path
    pub document_root: Option<String>,
}

impl StaticFilesConfiguration {
    /// Returns the directory served by the static file service.
    pub fn get_path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

/// Read and parse the application configuration.
///
/// The format follows the file extension: `.toml`, `.json`, anything
/// else is parsed as yaml.
pub async fn load_configuration(path: &str) -> Result<Configuration, BoxError> {
    let res = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| format!("failed to read configuration {path}: {err}"))?;
    parse_configuration(Path::new(path), &res)
}

pub fn parse_configuration(path: &Path, text: &str) -> Result<Configuration, BoxError> {
    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str::<Configuration>(text)?,
        Some("json") => serde_json::from_str::<Configuration>(text)?,
        _ => serde_yaml::from_str::<Configuration>(text)?,
    };
    Ok(config)
}
