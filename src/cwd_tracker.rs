//! cwdTracker - per-session working directory
//! - Relative paths given to builtins resolve against the tracked directory
//! - `cd` validates the target without touching the process working directory

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdResult {
    pub ok: bool,
    pub cwd: Option<String>,
    pub error: Option<String>,
}

/// Working directory context for one executor
#[derive(Debug, Clone)]
pub struct CwdTracker {
    cwd: PathBuf,
}

impl CwdTracker {
    /// Create a new CwdTracker starting at `initial` (defaults to the process cwd)
    pub fn new(initial: Option<PathBuf>) -> Self {
        let cwd = initial
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("/"));

        let cwd = cwd.canonicalize().unwrap_or(cwd);

        Self { cwd }
    }

    pub fn get_cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn get_cwd_string(&self) -> String {
        self.cwd.display().to_string()
    }

    /// Resolve a user-supplied path against the tracked directory.
    /// A leading `~` expands to the home directory.
    pub fn resolve(&self, target: &str) -> PathBuf {
        let expanded = expand_home(target);
        if expanded.is_absolute() {
            expanded
        } else {
            self.cwd.join(expanded)
        }
    }

    /// Change directory. `None` goes to the home directory.
    pub async fn cd(&mut self, target: Option<&str>) -> CdResult {
        let shown = target.unwrap_or("~");
        let resolved = match target {
            None => dirs::home_dir().unwrap_or_else(|| self.cwd.clone()),
            Some("..") => self.cwd.parent().map(Path::to_path_buf).unwrap_or_else(|| self.cwd.clone()),
            Some(".") => self.cwd.clone(),
            Some(path) => self.resolve(path),
        };

        let is_dir = fs::metadata(&resolved)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return CdResult {
                ok: false,
                cwd: None,
                error: Some(format!("cd: no such file or directory: {}", shown)),
            };
        }

        let resolved = resolved.canonicalize().unwrap_or(resolved);
        self.cwd = resolved.clone();

        CdResult {
            ok: true,
            cwd: Some(resolved.display().to_string()),
            error: None,
        }
    }
}

fn expand_home(target: &str) -> PathBuf {
    let rest = match target.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => rest,
        _ => return PathBuf::from(target),
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
        None => PathBuf::from(target),
    }
}
