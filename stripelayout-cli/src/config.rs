//! Configuration management
//!
//! Loads the striping layout and oracle settings used by the CLI.
//! Config directory: ~/.stripelayout/ (cross-platform)
//!
//! Config file format (~/.stripelayout/config.toml):
//! ```toml
//! [striping]
//! cell_size = 65536
//! data_blocks = 6
//! parity_blocks = 3
//! stripes_per_block = 4
//!
//! [oracle]
//! modulus = 29
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use stripelayout_core::config::{self as core_config, env_or};
use stripelayout_core::{oracle, ByteOracle, StripingConfig};

/// Structure of ~/.stripelayout/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CliConfig {
    /// Layout settings
    #[serde(default)]
    pub striping: StripingSettings,

    /// Byte oracle settings
    #[serde(default)]
    pub oracle: OracleSettings,
}

/// Layout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripingSettings {
    #[serde(default = "default_cell_size")]
    pub cell_size: u64,

    #[serde(default = "default_data_blocks")]
    pub data_blocks: usize,

    #[serde(default = "default_parity_blocks")]
    pub parity_blocks: usize,

    #[serde(default = "default_stripes_per_block")]
    pub stripes_per_block: u64,
}

impl Default for StripingSettings {
    fn default() -> Self {
        Self {
            cell_size: default_cell_size(),
            data_blocks: default_data_blocks(),
            parity_blocks: default_parity_blocks(),
            stripes_per_block: default_stripes_per_block(),
        }
    }
}

fn default_cell_size() -> u64 {
    env_or(core_config::CELL_SIZE_ENV, stripelayout_core::DEFAULT_CELL_SIZE)
}

fn default_data_blocks() -> usize {
    env_or(core_config::DATA_BLOCKS_ENV, stripelayout_core::DEFAULT_DATA_BLOCKS)
}

fn default_parity_blocks() -> usize {
    env_or(core_config::PARITY_BLOCKS_ENV, stripelayout_core::DEFAULT_PARITY_BLOCKS)
}

fn default_stripes_per_block() -> u64 {
    env_or(
        core_config::STRIPES_PER_BLOCK_ENV,
        stripelayout_core::DEFAULT_STRIPES_PER_BLOCK,
    )
}

/// Byte oracle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSettings {
    #[serde(default = "default_modulus")]
    pub modulus: u64,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            modulus: default_modulus(),
        }
    }
}

fn default_modulus() -> u64 {
    env_or(oracle::MODULUS_ENV, stripelayout_core::DEFAULT_ORACLE_MODULUS)
}

impl CliConfig {
    /// Validated striping layout
    pub fn striping_config(&self) -> Result<StripingConfig> {
        let s = &self.striping;
        StripingConfig::new(s.cell_size, s.data_blocks, s.parity_blocks, s.stripes_per_block)
            .context("Invalid striping configuration")
    }

    /// Validated byte oracle
    pub fn byte_oracle(&self) -> Result<ByteOracle> {
        ByteOracle::new(self.oracle.modulus).context("Invalid oracle configuration")
    }
}

/// Get the config directory path (~/.stripelayout/)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".stripelayout"))
}

/// Get the default config file path
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load configuration from `path`, or from the default location.
/// Falls back to defaults if the file doesn't exist.
pub fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };

    if !path.exists() {
        return Ok(CliConfig::default());
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Save configuration to `path`, creating parent directories
pub fn save_config(config: &CliConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, content).context("Failed to write config file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert!(config.striping_config().is_ok());
        assert!(config.byte_oracle().is_ok());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.striping.cell_size, default_cell_size());
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[striping]\ncell_size = 4096\ndata_blocks = 3\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.striping.cell_size, 4096);
        assert_eq!(config.striping.data_blocks, 3);
        assert_eq!(config.striping.stripes_per_block, default_stripes_per_block());
        assert_eq!(config.oracle.modulus, default_modulus());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = CliConfig::default();
        config.striping.parity_blocks = 2;
        config.oracle.modulus = 31;
        save_config(&config, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("[striping]"));
        assert!(content.contains("[oracle]"));

        let reloaded = load_config(Some(&path)).unwrap();
        assert_eq!(reloaded.striping.parity_blocks, 2);
        assert_eq!(reloaded.oracle.modulus, 31);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = CliConfig::default();
        config.striping.cell_size = 0;
        assert!(config.striping_config().is_err());

        let mut config = CliConfig::default();
        config.oracle.modulus = 300;
        assert!(config.byte_oracle().is_err());
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[striping\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
