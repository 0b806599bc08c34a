use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from mirrorstats.toml.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct MirrorConfig {
    pub paths: PathsConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    /// Each immediate subdirectory is a project.
    pub storage_root: PathBuf,
    pub web_logs: Vec<PathBuf>,
    /// Appended to a web log path to find its rotated sibling.
    pub rotated_suffix: String,
    pub sync_log_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// Environment variable holding the path of the secret file.
    pub secret_env: String,
}

// --- Default implementations ---

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("/srv/mirrors"),
            web_logs: vec![PathBuf::from("/var/log/nginx/mirrors.access.log")],
            rotated_suffix: ".1".to_string(),
            sync_log_dir: PathBuf::from("/var/log/rsyncd"),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/mirrorstats/traffic.db"),
            secret_env: "MIRRORSTATS_DB_SECRET_FILE".to_string(),
        }
    }
}

/// Load config from `path`. A missing file yields the defaults; a file
/// that exists but can't be read or parsed is an error.
pub fn load_config(path: &Path) -> Result<MirrorConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(MirrorConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Values from the command line that replace their config counterparts.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub storage_root: Option<PathBuf>,
    pub web_logs: Vec<PathBuf>,
    pub sync_logs: Vec<PathBuf>,
    pub db: Option<PathBuf>,
}

/// Log files a run reads, after overrides are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncLogs {
    /// Every `*.log` in this directory.
    Discover(PathBuf),
    Explicit(Vec<PathBuf>),
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub storage_root: PathBuf,
    /// Files to read in order, rotated siblings already expanded.
    pub web_logs: Vec<PathBuf>,
    pub sync_logs: SyncLogs,
    pub db_path: PathBuf,
    pub secret_env: String,
}

impl MirrorConfig {
    /// Merge CLI overrides. Explicit web logs are taken literally,
    /// without adding rotated siblings.
    pub fn resolve(&self, overrides: Overrides) -> RunSettings {
        let web_logs = if overrides.web_logs.is_empty() {
            crate::logfile::with_rotated_siblings(
                &self.paths.web_logs,
                &self.paths.rotated_suffix,
            )
        } else {
            overrides.web_logs
        };

        let sync_logs = if overrides.sync_logs.is_empty() {
            SyncLogs::Discover(self.paths.sync_log_dir.clone())
        } else {
            SyncLogs::Explicit(overrides.sync_logs)
        };

        RunSettings {
            storage_root: overrides
                .storage_root
                .unwrap_or_else(|| self.paths.storage_root.clone()),
            web_logs,
            sync_logs,
            db_path: overrides.db.unwrap_or_else(|| self.database.path.clone()),
            secret_env: self.database.secret_env.clone(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "invalid config {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}
