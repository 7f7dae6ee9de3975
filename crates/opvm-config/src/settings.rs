//! Settings read from `opvm.toml`
//!
//! ```toml
//! [vm]
//! max_stack_depth = 1024
//! max_call_depth = 32
//!
//! [meta]
//! compression_level = 9
//! ```

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Highest zlib compression level
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

/// Whole configuration file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpvmConfig {
    pub vm: VmConfig,
    pub meta: MetaConfig,
}

/// Resource limits of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VmConfig {
    /// Values the stack may hold across all frames
    pub max_stack_depth: usize,
    /// Frames that may be live at once, the entrypoint included
    pub max_call_depth: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_stack_depth: 1024,
            max_call_depth: 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetaConfig {
    /// zlib level used when compiling opcode tables (0-9)
    pub compression_level: u32,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            compression_level: MAX_COMPRESSION_LEVEL,
        }
    }
}

impl OpvmConfig {
    /// Load and validate a configuration file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.vm.max_stack_depth == 0 {
            return Err(invalid("vm.max_stack_depth", "must be at least 1"));
        }
        if self.vm.max_call_depth == 0 {
            return Err(invalid("vm.max_call_depth", "must be at least 1"));
        }
        if self.meta.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(invalid(
                "meta.compression_level",
                &format!(
                    "{} is above the maximum of {}",
                    self.meta.compression_level, MAX_COMPRESSION_LEVEL
                ),
            ));
        }
        Ok(())
    }

    /// Serialize back to TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
