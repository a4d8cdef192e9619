//! Shell configuration
//!
//! Read from YAML. Every field has a default, so an empty file (or no
//! file at all) is a valid configuration.
//!
//! ```yaml
//! rules_file: ~/.config/nlshell/rules.yaml
//! start_dir: ~/projects
//! natural_language: true
//! command_timeout_secs: 30
//! state_file: ~/.local/state/nlshell/session.json
//! log:
//!   level: info
//!   json: false
//! ```

use crate::error::{Result, ShellError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "NLSHELL_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Extra rules, evaluated before the built-in catalog
    pub rules_file: Option<PathBuf>,
    /// Initial working directory for the session
    pub start_dir: Option<PathBuf>,
    /// Start in natural-language mode
    pub natural_language: bool,
    pub command_timeout_secs: u64,
    /// Where the REPL saves and restores its state
    pub state_file: Option<PathBuf>,
    pub log: LogConfig,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            rules_file: None,
            start_dir: None,
            natural_language: false,
            command_timeout_secs: 30,
            state_file: None,
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

impl ShellConfig {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ShellError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: ShellConfig =
            serde_yaml::from_str(&content).map_err(|source| ShellError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        if config.command_timeout_secs == 0 {
            return Err(ShellError::InvalidConfig {
                path: path.to_path_buf(),
                message: "command_timeout_secs must be at least 1".to_string(),
            });
        }
        config.expand_paths();
        Ok(config)
    }

    /// Find and load the configuration.
    ///
    /// Order: `explicit`, then `$NLSHELL_CONFIG`, then
    /// `<config_dir>/nlshell/config.yaml`. A missing default file yields
    /// the defaults; a missing explicit file is an error.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load(PathBuf::from(path));
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    fn expand_paths(&mut self) {
        for path in [&mut self.rules_file, &mut self.start_dir, &mut self.state_file]
            .into_iter()
            .flatten()
        {
            *path = expand_home(path);
        }
    }
}

/// `<config_dir>/nlshell/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("nlshell").join("config.yaml"))
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
