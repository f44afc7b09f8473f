//! Layered configuration for the modlens CLI
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. YAML file (`--config`, else `config/modlens.yaml` when present)
//! 3. `MODLENS_` environment variables, `__` separating nested keys
//!    (`MODLENS_CAPTURE__PORTS="[502, 5020]"`, `MODLENS_LOGGING__LEVEL=debug`)
//! 4. Command line flags, applied by the caller through [`CliOverrides`]

use common::LoggingConfig;
use errors::{config_error, ModlensError, ModlensResult};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use modlens_decode::{CaptureOptions, FRAME_HEADER_LEN};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_PATH: &str = "config/modlens.yaml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "MODLENS_";

/// JSON document settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub pretty: bool,
    pub include_diagnostics: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            include_diagnostics: true,
        }
    }
}

/// Complete CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureOptions,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Flag values that win over every other source
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub ports: Vec<u16>,
    pub pretty: Option<bool>,
    /// `-v` count; 0 leaves `logging.level` alone
    pub verbosity: u8,
}

impl AppConfig {
    /// Load defaults, YAML file and environment, then validate.
    ///
    /// An explicit `config_path` must exist; the default path is optional.
    pub fn load(config_path: Option<&Path>) -> ModlensResult<Self> {
        let file = match config_path {
            Some(path) if !path.is_file() => {
                return Err(config_error!("config file not found: {}", path.display()));
            },
            Some(path) => Some(path.to_path_buf()),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                default.is_file().then_some(default)
            },
        };

        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
        if let Some(path) = &file {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: AppConfig = figment.extract().map_err(ModlensError::from)?;
        config.validate()?;

        if let Some(path) = &file {
            tracing::debug!("Configuration loaded from {}", path.display());
        }
        Ok(config)
    }

    /// Apply command line flags on top of the loaded layers
    pub fn with_overrides(mut self, overrides: &CliOverrides) -> Self {
        if !overrides.ports.is_empty() {
            self.capture.ports = overrides.ports.clone();
        }
        if let Some(pretty) = overrides.pretty {
            self.output.pretty = pretty;
        }
        self.logging.level = common::logging::level_for_verbosity(
            overrides.verbosity,
            &self.logging.level,
        );
        self
    }

    pub fn validate(&self) -> ModlensResult<()> {
        if self.capture.ports.is_empty() {
            return Err(ModlensError::InvalidConfig {
                field: "capture.ports".to_string(),
                reason: "at least one port is required".to_string(),
            });
        }
        if self.capture.max_frame_len < FRAME_HEADER_LEN {
            return Err(ModlensError::InvalidConfig {
                field: "capture.max_frame_len".to_string(),
                reason: format!(
                    "{} is smaller than a frame header ({} bytes)",
                    self.capture.max_frame_len, FRAME_HEADER_LEN
                ),
            });
        }
        if self.logging.level.trim().is_empty() {
            return Err(ModlensError::InvalidConfig {
                field: "logging.level".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
