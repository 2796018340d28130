//! Trusted workspace registry.
//!
//! `<hybot home>/workspaces.yaml` lists workspaces the user has agreed to
//! run the agent in:
//!
//! ```yaml
//! trusted:
//!   - /home/alice/projects/api
//! ```
//!
//! Paths are stored normalized (canonical when the directory exists) and
//! compared the same way, so `./api` and `/home/alice/projects/api` match.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};

/// File name of the registry inside the global directory.
pub const WORKSPACES_FILE_NAME: &str = "workspaces.yaml";

#[derive(Debug, Default, Serialize, Deserialize)]
struct TrustFile {
    #[serde(default)]
    trusted: Vec<PathBuf>,
}

/// The trusted workspace registry.
#[derive(Debug, Clone)]
pub struct TrustStore {
    path: PathBuf,
    trusted: Vec<PathBuf>,
}

impl TrustStore {
    /// Load the registry in `hybot_home`. A missing file is an empty registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(hybot_home: &Path) -> ConfigResult<Self> {
        let path = hybot_home.join(WORKSPACES_FILE_NAME);
        let trusted = match std::fs::read_to_string(&path) {
            Ok(content) => {
                let file: Option<TrustFile> =
                    serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                        path: path.display().to_string(),
                        source: e,
                    })?;
                file.unwrap_or_default().trusted
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no workspace registry yet");
                Vec::new()
            },
            Err(e) => {
                return Err(ConfigError::ReadError {
                    path: path.display().to_string(),
                    source: e,
                });
            },
        };
        Ok(Self { path, trusted })
    }

    /// Registry file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Trusted workspaces, in insertion order.
    #[must_use]
    pub fn trusted(&self) -> &[PathBuf] {
        &self.trusted
    }

    /// Whether `workspace` is trusted.
    #[must_use]
    pub fn is_trusted(&self, workspace: &Path) -> bool {
        let wanted = normalize(workspace);
        self.trusted.iter().any(|t| normalize(t) == wanted)
    }

    /// Trust `workspace` and save the registry. Returns `false` if it was
    /// already trusted (the file is left untouched).
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be written.
    pub fn add(&mut self, workspace: &Path) -> ConfigResult<bool> {
        if self.is_trusted(workspace) {
            return Ok(false);
        }
        let normalized = normalize(workspace);
        self.trusted.push(normalized.clone());
        self.save()?;
        info!(workspace = %normalized.display(), "workspace trusted");
        Ok(true)
    }

    fn save(&self) -> ConfigResult<()> {
        let write_err = |e: std::io::Error| ConfigError::WriteError {
            path: self.path.display().to_string(),
            source: e,
        };
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(write_err)?;
        }
        let body = serde_yaml::to_string(&TrustFile {
            trusted: self.trusted.clone(),
        })
        .map_err(|e| ConfigError::ParseError {
            path: self.path.display().to_string(),
            source: e,
        })?;
        std::fs::write(&self.path, body).map_err(write_err)
    }
}

/// Canonical path when it exists, otherwise an absolute, lexically
/// normalized path.
fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                out.pop();
            },
            other => out.push(other),
        }
    }
    out
}
