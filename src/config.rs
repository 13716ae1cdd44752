use crate::application::rate_engine::DEFAULT_REFRESH_INTERVAL;
use crate::domain::remittance::Session;
use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/remitflow.toml";
const ENV_PREFIX: &str = "REMITFLOW";

/// Runtime settings. Read from the TOML file first, then from
/// `REMITFLOW_*` environment variables, which win.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub access_token: Option<String>,
    pub user_id: Option<String>,
    pub log_level: String,
    pub rate_refresh_secs: u64,
    /// CSV catalog replacing the built-in corridors.
    pub corridors_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080/api/".to_string(),
            access_token: None,
            user_id: None,
            log_level: "info".to_string(),
            rate_refresh_secs: DEFAULT_REFRESH_INTERVAL.as_secs(),
            corridors_path: None,
        }
    }
}

impl AppConfig {
    /// Loads `path`, or the default location when `None`. A missing file is
    /// not an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.rate_refresh_secs.max(1))
    }

    /// Both the token and the user id are needed to act on the user's behalf.
    pub fn session(&self) -> Option<Session> {
        match (&self.access_token, &self.user_id) {
            (Some(token), Some(user)) if !token.is_empty() && !user.is_empty() => Some(Session {
                access_token: token.clone(),
                user_id: user.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "api_base_url = \"https://remit.example.com/v2/\"").unwrap();
        writeln!(file, "access_token = \"tok\"").unwrap();
        writeln!(file, "user_id = \"u-1\"").unwrap();
        writeln!(file, "rate_refresh_secs = 0").unwrap();

        let cfg = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.api_base_url, "https://remit.example.com/v2/");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(1));
        assert_eq!(cfg.session().unwrap().user_id, "u-1");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(cfg.rate_refresh_secs, 3600);
        assert!(cfg.corridors_path.is_none());
    }

    #[test]
    fn test_session_requires_token_and_user() {
        let cfg = AppConfig {
            access_token: Some("tok".into()),
            ..AppConfig::default()
        };
        assert!(cfg.session().is_none());
    }
}
