#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Configuration for HyBot.
//!
//! # Usage
//!
//! ```rust,no_run
//! use hybot_config::{Config, LoadOptions};
//!
//! let resolved = Config::load(&LoadOptions::for_workspace(".")).unwrap();
//! println!("approval mode: {}", resolved.config.approval.mode);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Workspace** (`{workspace}/.hybot/config.yaml`)
//! 2. **Global** (`--config PATH`, else `$HYBOT_HOME/config.yaml`, else `~/.hybot/config.yaml`)
//! 3. **Embedded defaults** (`defaults.yaml` compiled into the binary)
//!
//! Mappings merge key by key; scalars and lists from a higher layer replace
//! lower ones.
//!
//! # Design
//!
//! This crate has no dependencies on other internal hybot crates. Values
//! like the approval mode stay strings here and are converted to domain
//! types by the CLI.

/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered configuration merging.
pub mod merge;
/// Trusted workspace registry.
pub mod trust;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    LoadOptions, ResolvedConfig, hybot_home, init_workspace, workspace_config_path,
};
pub use trust::TrustStore;
pub use types::*;

impl Config {
    /// Load with the full precedence chain.
    ///
    /// # Errors
    ///
    /// See [`loader::load`].
    pub fn load(options: &LoadOptions) -> ConfigResult<ResolvedConfig> {
        loader::load(options)
    }
}
