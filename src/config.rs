use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::medications::InsertPolicy;

/// Application-level constants
pub const APP_NAME: &str = "MedCheck";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default explanation table file name inside the data directory.
pub const EXPLANATIONS_FILE: &str = "explanations.yml";
/// Default interaction table file name inside the data directory.
pub const INTERACTIONS_FILE: &str = "interactions.yml";

/// Conversations idle longer than this are evicted: 30 minutes.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 1800;

const ENV_DATA_DIR: &str = "MEDCHECK_DATA_DIR";
const ENV_EXPLANATIONS: &str = "MEDCHECK_EXPLANATIONS";
const ENV_INTERACTIONS: &str = "MEDCHECK_INTERACTIONS";
const ENV_INSERT_POLICY: &str = "MEDCHECK_INSERT_POLICY";
const ENV_IDLE_TIMEOUT: &str = "MEDCHECK_IDLE_TIMEOUT_SECS";

/// Default `EnvFilter` directive when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "medcheck_lib=info"
}

/// Get the application data directory
/// ~/MedCheck/ when a home directory is known, the working directory otherwise.
pub fn app_data_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(APP_NAME),
        None => PathBuf::from("."),
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

/// Runtime settings for the medication core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub explanations_path: PathBuf,
    pub interactions_path: PathBuf,
    pub insert_policy: InsertPolicy,
    pub idle_timeout: Duration,
}

impl AppConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            explanations_path: data_dir.join(EXPLANATIONS_FILE),
            interactions_path: data_dir.join(INTERACTIONS_FILE),
            data_dir,
            insert_policy: InsertPolicy::default(),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }

    /// Build from `MEDCHECK_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`Self::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = non_empty(lookup(ENV_DATA_DIR))
            .map(PathBuf::from)
            .unwrap_or_else(app_data_dir);
        let mut config = Self::with_data_dir(data_dir);

        if let Some(path) = non_empty(lookup(ENV_EXPLANATIONS)) {
            config.explanations_path = resolve(&config.data_dir, &path);
        }
        if let Some(path) = non_empty(lookup(ENV_INTERACTIONS)) {
            config.interactions_path = resolve(&config.data_dir, &path);
        }
        if let Some(policy) = non_empty(lookup(ENV_INSERT_POLICY)) {
            config.insert_policy = policy
                .parse()
                .map_err(|reason| ConfigError::InvalidValue {
                    var: ENV_INSERT_POLICY,
                    reason,
                })?;
        }
        if let Some(secs) = non_empty(lookup(ENV_IDLE_TIMEOUT)) {
            let secs: u64 = secs.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    var: ENV_IDLE_TIMEOUT,
                    reason: e.to_string(),
                }
            })?;
            config.idle_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Relative table paths are taken from the data directory.
fn resolve(data_dir: &Path, path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        data_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn defaults_under_data_dir() {
        let config = AppConfig::with_data_dir("/srv/medcheck");
        assert_eq!(config.explanations_path, PathBuf::from("/srv/medcheck/explanations.yml"));
        assert_eq!(config.interactions_path, PathBuf::from("/srv/medcheck/interactions.yml"));
        assert_eq!(config.insert_policy, InsertPolicy::Permissive);
        assert_eq!(config.idle_timeout, Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS));
    }

    #[test]
    fn env_overrides_apply() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("MEDCHECK_DATA_DIR", "/data"),
            ("MEDCHECK_EXPLANATIONS", "expliqueMec.yml"),
            ("MEDCHECK_INTERACTIONS", "/etc/medcheck/interacoes.json"),
            ("MEDCHECK_INSERT_POLICY", "strict"),
            ("MEDCHECK_IDLE_TIMEOUT_SECS", "60"),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.explanations_path, PathBuf::from("/data/expliqueMec.yml"));
        assert_eq!(
            config.interactions_path,
            PathBuf::from("/etc/medcheck/interacoes.json")
        );
        assert_eq!(config.insert_policy, InsertPolicy::Strict);
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
    }

    #[test]
    fn no_env_uses_app_data_dir() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.data_dir, app_data_dir());
    }

    #[test]
    fn invalid_policy_is_error() {
        let err = AppConfig::from_lookup(lookup_from(&[("MEDCHECK_INSERT_POLICY", "lenient")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                var: "MEDCHECK_INSERT_POLICY",
                ..
            }
        ));
    }

    #[test]
    fn invalid_timeout_is_error() {
        let err = AppConfig::from_lookup(lookup_from(&[("MEDCHECK_IDLE_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                var: "MEDCHECK_IDLE_TIMEOUT_SECS",
                ..
            }
        ));
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        if dirs::home_dir().is_some() {
            assert!(app_data_dir().ends_with("MedCheck"));
        }
    }

    #[test]
    fn app_name_is_medcheck() {
        assert_eq!(APP_NAME, "MedCheck");
    }
}
