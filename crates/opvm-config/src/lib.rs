//! opvm Configuration
//!
//! Provides the resource limits and tooling knobs shared by the opvm crates:
//! - VM limits (`[vm]`): stack depth and call depth
//! - Metadata tooling (`[meta]`): compression level of the compiled form
//!
//! # Configuration Hierarchy
//!
//! Later sources override earlier ones:
//! 1. Built-in defaults
//! 2. Project config (`opvm.toml`, found by walking up from a directory)
//! 3. Environment variables (`OPVM_*`)
//!
//! # Example
//!
//! ```no_run
//! use opvm_config::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::new().load_from_directory(Path::new(".")).unwrap();
//! println!("max stack depth: {}", config.settings.vm.max_stack_depth);
//! ```

pub mod loader;
pub mod settings;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

pub use loader::{Config, ConfigLoader, CONFIG_FILE_NAME};
pub use settings::{MetaConfig, OpvmConfig, VmConfig};
