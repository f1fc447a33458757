use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

use crate::storage::http::HttpStoreConfig;

pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config from {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("The http backend needs {0}; set it in the config file or the environment")]
    MissingHttpSetting(&'static str),

    #[error("Invalid value '{value}' for {variable}")]
    InvalidEnv { variable: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Json,
    Http,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub data_path: Option<PathBuf>,
    pub api_url: Option<String>,
    pub project_id: Option<String>,
    pub public_key: Option<String>,
    /// Owner of the settings rows
    pub user_id: Option<String>,
    /// Log filter used when `TASKFLOW_LOG` is unset
    pub log: Option<String>,
}

impl Config {
    /// `<config_dir>/taskflow/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("taskflow")
            .join("config.toml")
    }

    /// Reads the config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::ReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };
        toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Overrides file values with `TASKFLOW_*` variables found through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(backend) = lookup("TASKFLOW_BACKEND") {
            self.backend = match backend.trim().to_lowercase().as_str() {
                "json" => Backend::Json,
                "http" => Backend::Http,
                "memory" => Backend::Memory,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        variable: "TASKFLOW_BACKEND",
                        value: backend,
                    });
                }
            };
        }
        if let Some(path) = lookup("TASKFLOW_DATA_PATH") {
            self.data_path = Some(PathBuf::from(path));
        }
        for (variable, field) in [
            ("TASKFLOW_API_URL", &mut self.api_url),
            ("TASKFLOW_PROJECT_ID", &mut self.project_id),
            ("TASKFLOW_PUBLIC_KEY", &mut self.public_key),
            ("TASKFLOW_USER_ID", &mut self.user_id),
        ] {
            if let Some(value) = lookup(variable) {
                *field = Some(value);
            }
        }
        Ok(())
    }

    pub fn from_environment(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env(|variable| std::env::var(variable).ok())?;
        Ok(config)
    }

    /// Location of the JSON store; `<data_local_dir>/taskflow/store.json` by default.
    pub fn data_path(&self) -> PathBuf {
        self.data_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("taskflow")
                .join("store.json")
        })
    }

    pub fn http(&self) -> Result<HttpStoreConfig, ConfigError> {
        Ok(HttpStoreConfig {
            base_url: self
                .api_url
                .clone()
                .ok_or(ConfigError::MissingHttpSetting("api_url"))?,
            project_id: self
                .project_id
                .clone()
                .ok_or(ConfigError::MissingHttpSetting("project_id"))?,
            public_key: self
                .public_key
                .clone()
                .ok_or(ConfigError::MissingHttpSetting("public_key"))?,
        })
    }

    /// Settings owner, `local` when none is configured.
    pub fn user_id(&self) -> &str {
        self.user_id.as_deref().unwrap_or("local")
    }

    pub fn log_filter(&self) -> &str {
        self.log.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();

        let config = Config::load(&dir.path().join("config.toml")).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.log_filter(), "warn");
        assert_eq!(config.user_id(), "local");
    }

    #[test]
    fn test_file_values_are_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
backend = "http"
api_url = "https://records.example.com"
project_id = "p1"
public_key = "key"
log = "taskflow=debug"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();

        assert_eq!(config.backend, Backend::Http);
        assert_eq!(config.log_filter(), "taskflow=debug");
        assert_eq!(
            config.http().unwrap(),
            HttpStoreConfig {
                base_url: "https://records.example.com".to_string(),
                project_id: "p1".to_string(),
                public_key: "key".to_string(),
            }
        );
    }

    #[test]
    fn test_unparsable_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "backend = [").unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn test_environment_overrides_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TASKFLOW_BACKEND", "memory"),
            ("TASKFLOW_USER_ID", "u-42"),
            ("TASKFLOW_API_URL", "https://other.example.com"),
        ]);
        let mut config = Config {
            api_url: Some("https://records.example.com".to_string()),
            ..Config::default()
        };

        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.user_id(), "u-42");
        assert_eq!(config.api_url.as_deref(), Some("https://other.example.com"));
        assert!(matches!(
            config.http(),
            Err(ConfigError::MissingHttpSetting("project_id"))
        ));
    }

    #[test]
    fn test_invalid_backend_variable() {
        let mut config = Config::default();

        let result = config.apply_env(|key| (key == "TASKFLOW_BACKEND").then(|| "ftp".to_string()));

        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }
}
