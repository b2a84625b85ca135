//! Runtime configuration and file layout.
//!
//! Every path hangs off one base temp directory so a test (or a second
//! sentinel) can be isolated with `HOTRELOAD_SENTINEL_TMPDIR`. The optional
//! TOML file tunes intervals and can pin individual paths.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SentinelError};
use crate::status::StatusThresholds;

pub const CONFIG_ENV: &str = "HOTRELOAD_SENTINEL_CONFIG";
pub const TMPDIR_ENV: &str = "HOTRELOAD_SENTINEL_TMPDIR";
pub const ENC_LOG_DIR_ENV: &str = "Microsoft_CodeAnalysis_EditAndContinue_LogDir";
pub const XAML_LOG_ENV: &str = "HOTRELOAD_XAML_LOG_MESSAGES";

const DEFAULT_CONFIG_RELATIVE_PATH: &str = ".hotreload-sentinel/config.toml";

const STATE_FILE_NAME: &str = "hotreload-sentinel.state.json";
const PID_FILE_NAME: &str = "hotreload-sentinel.pid";
const WATCH_LOG_NAME: &str = "hotreload-sentinel.watch.log";
const PORT_FILE_PATTERN: &str = "hotreload-diag-*.port";
const HOT_RELOAD_DIR_NAME: &str = "HotReloadLog";
const SESSION_LOG_NAME: &str = "Session.log";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub paths: PathsConfig,
    pub watch: WatchConfig,
    pub server: ServerConfig,
}

/// Per-path overrides. Unset entries derive from the base temp directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub tmp_dir: Option<PathBuf>,
    pub hot_reload_dir: Option<PathBuf>,
    pub session_log: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
    pub pid_file: Option<PathBuf>,
    pub watch_log: Option<PathBuf>,
    pub port_glob: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub poll_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub heartbeat_fresh_secs: f64,
    pub log_fresh_secs: f64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            heartbeat_timeout_ms: 2000,
            heartbeat_fresh_secs: 10.0,
            log_fresh_secs: 20.0,
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms.max(1))
    }

    pub fn thresholds(&self) -> StatusThresholds {
        StatusThresholds {
            heartbeat_fresh_secs: self.heartbeat_fresh_secs,
            log_fresh_secs: self.log_fresh_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub command_timeout_secs: u64,
    pub max_follow_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 15,
            max_follow_secs: 600,
        }
    }
}

impl ServerConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or(SentinelError::HomeDirNotFound)?;
    Ok(home.join(DEFAULT_CONFIG_RELATIVE_PATH))
}

/// Loads configuration. A missing file yields defaults.
pub fn load_config(path: Option<PathBuf>) -> Result<SentinelConfig> {
    let config_path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    if !config_path.exists() {
        return Ok(SentinelConfig::default());
    }

    let content = fs_err::read_to_string(&config_path)
        .map_err(|err| SentinelError::io("reading config", err))?;
    toml::from_str::<SentinelConfig>(&content).map_err(|err| SentinelError::ConfigMalformed {
        path: config_path.clone(),
        details: err.to_string(),
    })
}

/// Resolved file layout for one sentinel instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelPaths {
    pub tmp_dir: PathBuf,
    pub hot_reload_dir: PathBuf,
    pub session_log: PathBuf,
    pub state_file: PathBuf,
    pub pid_file: PathBuf,
    pub watch_log: PathBuf,
    pub port_glob: String,
}

impl SentinelPaths {
    /// Resolves paths from config overrides and the process environment.
    pub fn from_env(config: &PathsConfig) -> Self {
        Self::resolve(config, |name| {
            std::env::var(name).ok().filter(|value| !value.is_empty())
        })
    }

    /// Resolves paths with an explicit environment lookup.
    pub fn resolve<F>(config: &PathsConfig, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let tmp_dir = config
            .tmp_dir
            .clone()
            .or_else(|| env(TMPDIR_ENV).map(PathBuf::from))
            .unwrap_or_else(platform_tmp_dir);

        let hot_reload_dir = config
            .hot_reload_dir
            .clone()
            .or_else(|| env(ENC_LOG_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(|| tmp_dir.join(HOT_RELOAD_DIR_NAME));

        let session_log = config
            .session_log
            .clone()
            .unwrap_or_else(|| hot_reload_dir.join(SESSION_LOG_NAME));

        let port_glob = config
            .port_glob
            .clone()
            .unwrap_or_else(|| tmp_dir.join(PORT_FILE_PATTERN).to_string_lossy().into_owned());

        Self {
            state_file: config
                .state_file
                .clone()
                .unwrap_or_else(|| tmp_dir.join(STATE_FILE_NAME)),
            pid_file: config
                .pid_file
                .clone()
                .unwrap_or_else(|| tmp_dir.join(PID_FILE_NAME)),
            watch_log: config
                .watch_log
                .clone()
                .unwrap_or_else(|| tmp_dir.join(WATCH_LOG_NAME)),
            hot_reload_dir,
            session_log,
            port_glob,
            tmp_dir,
        }
    }

    pub fn issue_draft_path(&self, unix_secs: i64) -> PathBuf {
        self.tmp_dir
            .join(format!("hotreload-issue-draft-{}.md", unix_secs))
    }
}

#[cfg(unix)]
fn platform_tmp_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

#[cfg(not(unix))]
fn platform_tmp_dir() -> PathBuf {
    std::env::temp_dir()
}
