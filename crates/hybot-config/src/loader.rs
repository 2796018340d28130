//! Config file discovery and layered loading.
//!
//! `load()` builds the effective configuration:
//! 1. Parse embedded `defaults.yaml` -> base
//! 2. Merge the global file (`--config PATH`, or `<hybot home>/config.yaml`)
//! 3. Merge `{workspace}/.hybot/config.yaml`
//! 4. Deserialize and validate

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_yaml::Value;
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::merge::deep_merge;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_YAML: &str = include_str!("defaults.yaml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: usize = 1_048_576;

/// Name of the per-user and per-workspace config directory.
pub const LOCAL_DIR_NAME: &str = ".hybot";

/// Config file name inside [`LOCAL_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Environment variable overriding the global directory.
pub const HYBOT_HOME_ENV: &str = "HYBOT_HOME";

/// Template written by [`init_workspace`].
const WORKSPACE_CONFIG_TEMPLATE: &str = "\
# Workspace configuration. Overrides the global ~/.hybot/config.yaml.
# Only list the fields you want to change; everything else is inherited.
#
# approval:
#   mode: always
";

/// The effective configuration and where it came from.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Merged, validated configuration.
    pub config: Config,
    /// Files that contributed, in merge order.
    pub loaded_files: Vec<PathBuf>,
}

impl ResolvedConfig {
    /// Render the effective configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> ConfigResult<String> {
        serde_yaml::to_string(&self.config).map_err(|e| ConfigError::ParseError {
            path: "<resolved config>".to_owned(),
            source: e,
        })
    }
}

/// Where to look for configuration.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Workspace root. `None` skips the workspace layer.
    pub workspace_root: Option<PathBuf>,
    /// Explicit global config file. Must exist when set.
    pub config_file: Option<PathBuf>,
    /// Global directory, bypassing `HYBOT_HOME` and `~/.hybot`.
    pub home_override: Option<PathBuf>,
}

impl LoadOptions {
    /// Options for `workspace_root`.
    #[must_use]
    pub fn for_workspace(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: Some(workspace_root.into()),
            ..Self::default()
        }
    }

    /// Use `path` as the global config file.
    #[must_use]
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Use `home` as the global directory.
    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_override = Some(home.into());
        self
    }
}

/// Load the layered configuration.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a file is unreadable or malformed, an
/// explicit `config_file` is missing, or the merged result is invalid.
pub fn load(options: &LoadOptions) -> ConfigResult<ResolvedConfig> {
    let mut merged: Value =
        serde_yaml::from_str(DEFAULTS_YAML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let mut loaded_files = Vec::new();

    // Global layer.
    if let Some(path) = &options.config_file {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "config file not found"),
        })?;
        deep_merge(&mut merged, &overlay);
        info!(path = %path.display(), "loaded config file");
        loaded_files.push(path.clone());
    } else {
        let home = hybot_home(options.home_override.as_deref())?;
        let path = home.join(CONFIG_FILE_NAME);
        if let Some(overlay) = try_load_file(&path)? {
            deep_merge(&mut merged, &overlay);
            info!(path = %path.display(), "loaded global config");
            loaded_files.push(path);
        }
    }

    // Workspace layer.
    if let Some(root) = &options.workspace_root {
        let path = workspace_config_path(root);
        if let Some(overlay) = try_load_file(&path)? {
            deep_merge(&mut merged, &overlay);
            info!(path = %path.display(), "loaded workspace config");
            loaded_files.push(path);
        }
    }

    let config: Config =
        serde_yaml::from_value(merged).map_err(|e| ConfigError::ParseError {
            path: "<merged config>".to_owned(),
            source: e,
        })?;

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        loaded_files,
    })
}

/// The global directory: `home_override`, else `$HYBOT_HOME`, else `~/.hybot`.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDir`] if none can be determined.
pub fn hybot_home(home_override: Option<&Path>) -> ConfigResult<PathBuf> {
    if let Some(home) = home_override {
        return Ok(home.to_path_buf());
    }
    if let Some(env_home) = std::env::var_os(HYBOT_HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(env_home));
    }
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(LOCAL_DIR_NAME))
        .ok_or(ConfigError::NoHomeDir)
}

/// `{workspace}/.hybot/config.yaml`.
#[must_use]
pub fn workspace_config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(LOCAL_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// Create `{workspace}/.hybot/config.yaml` from a template if it does not
/// exist. Returns the path.
///
/// # Errors
///
/// Returns [`ConfigError::WriteError`] if the directory or file cannot be created.
pub fn init_workspace(workspace_root: &Path) -> ConfigResult<PathBuf> {
    let path = workspace_config_path(workspace_root);
    let write_err = |e: std::io::Error| ConfigError::WriteError {
        path: path.display().to_string(),
        source: e,
    };

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(write_err)?;
    }
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
    {
        Ok(mut file) => {
            file.write_all(WORKSPACE_CONFIG_TEMPLATE.as_bytes())
                .map_err(write_err)?;
            info!(path = %path.display(), "initialized workspace config");
        },
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            debug!(path = %path.display(), "workspace config already exists");
        },
        Err(e) => return Err(write_err(e)),
    }
    Ok(path)
}

/// Read and parse a file, returning `None` if it does not exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }

    let value: Value = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_defaults_match_default_impl() {
        let parsed: Config = serde_yaml::from_str(DEFAULTS_YAML).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_load_with_no_files_uses_defaults() {
        let home = TempDir::new().unwrap();
        let ws = TempDir::new().unwrap();

        let resolved =
            load(&LoadOptions::for_workspace(ws.path()).with_home(home.path())).unwrap();
        assert_eq!(resolved.config, Config::default());
        assert!(resolved.loaded_files.is_empty());
    }

    #[test]
    fn test_workspace_overrides_global() {
        let home = TempDir::new().unwrap();
        let ws = TempDir::new().unwrap();
        write(
            &home.path().join("config.yaml"),
            "approval:\n  mode: never\n  timeout_secs: 60\n",
        );
        write(
            &workspace_config_path(ws.path()),
            "approval:\n  mode: always\n",
        );

        let resolved =
            load(&LoadOptions::for_workspace(ws.path()).with_home(home.path())).unwrap();
        assert_eq!(resolved.config.approval.mode, "always");
        assert_eq!(resolved.config.approval.timeout_secs, 60);
        assert_eq!(resolved.loaded_files.len(), 2);
    }

    #[test]
    fn test_explicit_config_file_replaces_global() {
        let home = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        write(&home.path().join("config.yaml"), "approval:\n  mode: never\n");
        let explicit = other.path().join("custom.yaml");
        write(&explicit, "guard:\n  shell: sh\n");

        let resolved = load(
            &LoadOptions::default()
                .with_home(home.path())
                .with_config_file(&explicit),
        )
        .unwrap();
        assert_eq!(resolved.config.approval.mode, "dangerous");
        assert_eq!(resolved.config.guard.shell, "sh");
    }

    #[test]
    fn test_missing_explicit_config_file_is_error() {
        let dir = TempDir::new().unwrap();
        let err = load(&LoadOptions::default().with_config_file(dir.path().join("nope.yaml")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let home = TempDir::new().unwrap();
        write(&home.path().join("config.yaml"), "approval: [unclosed\n");

        let err = load(&LoadOptions::default().with_home(home.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_invalid_value_is_validation_error() {
        let home = TempDir::new().unwrap();
        write(&home.path().join("config.yaml"), "approval:\n  mode: maybe\n");

        let err = load(&LoadOptions::default().with_home(home.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_init_workspace_template_loads() {
        let home = TempDir::new().unwrap();
        let ws = TempDir::new().unwrap();

        let path = init_workspace(ws.path()).unwrap();
        assert!(path.exists());

        // Comment-only file merges as a no-op.
        let resolved =
            load(&LoadOptions::for_workspace(ws.path()).with_home(home.path())).unwrap();
        assert_eq!(resolved.config, Config::default());
        assert_eq!(resolved.loaded_files, vec![path]);
    }

    #[test]
    fn test_init_workspace_keeps_existing_file() {
        let ws = TempDir::new().unwrap();
        let path = workspace_config_path(ws.path());
        write(&path, "approval:\n  mode: never\n");

        init_workspace(ws.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "approval:\n  mode: never\n"
        );
    }

    #[test]
    fn test_to_yaml_round_trips() {
        let resolved = ResolvedConfig {
            config: Config::default(),
            loaded_files: Vec::new(),
        };
        let yaml = resolved.to_yaml().unwrap();
        assert!(yaml.contains("mode: dangerous"));
    }
}
