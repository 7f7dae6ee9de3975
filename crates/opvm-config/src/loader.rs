//! Configuration Loader
//!
//! Finds `opvm.toml` and applies environment overrides on top of it.

use crate::settings::OpvmConfig;
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File searched for by [`ConfigLoader::load_from_directory`]
pub const CONFIG_FILE_NAME: &str = "opvm.toml";

/// Configuration loader
///
/// Precedence, lowest first:
/// 1. Defaults
/// 2. Project config (`opvm.toml`) - overrides defaults
/// 3. Environment variables (`OPVM_*`) - overrides project
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Skip `OPVM_*` variables
    ignore_env: bool,
}

/// Loaded configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: OpvmConfig,

    /// Directory where opvm.toml was found
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader that ignores the environment
    pub fn without_env() -> Self {
        Self { ignore_env: true }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find opvm.toml; without one the
    /// defaults are used.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, settings) = find_project_config(start_dir)?;
        Ok(Config {
            settings: self.apply_env_overrides(settings)?,
            project_root,
        })
    }

    /// Load configuration from a specific file
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<Config> {
        let settings = OpvmConfig::load_from_file(config_path)?;
        Ok(Config {
            settings: self.apply_env_overrides(settings)?,
            project_root: config_path.parent().map(Path::to_path_buf),
        })
    }

    /// Apply environment variable overrides
    ///
    /// Recognized: OPVM_MAX_STACK_DEPTH, OPVM_MAX_CALL_DEPTH,
    /// OPVM_COMPRESSION_LEVEL. The result is validated again.
    fn apply_env_overrides(&self, mut config: OpvmConfig) -> ConfigResult<OpvmConfig> {
        if self.ignore_env {
            return Ok(config);
        }

        if let Some(depth) = env_override("OPVM_MAX_STACK_DEPTH")? {
            config.vm.max_stack_depth = depth;
        }
        if let Some(depth) = env_override("OPVM_MAX_CALL_DEPTH")? {
            config.vm.max_call_depth = depth;
        }
        if let Some(level) = env_override("OPVM_COMPRESSION_LEVEL")? {
            config.meta.compression_level = level;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Walk up from `start_dir` looking for opvm.toml
fn find_project_config(start_dir: &Path) -> ConfigResult<(Option<PathBuf>, OpvmConfig)> {
    let mut current = start_dir.to_path_buf();
    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            let config = OpvmConfig::load_from_file(&config_path)?;
            return Ok((Some(current), config));
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return Ok((None, OpvmConfig::default())),
        }
    }
}

fn env_override<T: FromStr>(name: &str) -> ConfigResult<Option<T>> {
    let Ok(raw) = env::var(name) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            field: name.to_string(),
            reason: format!("'{}' is not a non-negative integer", raw),
        })
}

impl Config {
    /// Whether an opvm.toml was found
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }

    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }
}
