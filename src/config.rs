//! Configuration management for virtualgroup

use crate::error::{Error, Result};
use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default deposit denomination
pub const DEFAULT_DEPOSIT_DENOM: &str = "BNB";

/// Default stake required per stored byte
pub const DEFAULT_GVG_STAKING_PER_BYTES: u128 = 16_000;

/// Default maximum number of groups per family
pub const DEFAULT_MAX_GVG_NUM_PER_FAMILY: u32 = 10;

/// Default maximum stored size per family: 64 TiB
pub const DEFAULT_MAX_STORE_SIZE_PER_FAMILY: u64 = 64 * 1024 * 1024 * 1024 * 1024;

/// Default swap-in validity window: 7 days
pub const DEFAULT_SWAP_IN_VALIDITY_PERIOD: u64 = 7 * 24 * 60 * 60;

/// Default number of SPs allowed to exit concurrently
pub const DEFAULT_SP_CONCURRENT_EXIT_NUM: u32 = 1;

/// Module parameters, persisted in the group store and changed only by the
/// governance authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// Denomination of group deposits
    pub deposit_denom: String,

    /// Stake required per stored byte
    #[serde(default = "default_gvg_staking_per_bytes")]
    pub gvg_staking_per_bytes: u128,

    /// Maximum number of groups in one family
    pub max_global_virtual_group_num_per_family: u32,

    /// Maximum stored size of one family in bytes. Enforced by the storage
    /// subsystem when objects are placed; kept here as a governed parameter.
    #[serde(default = "default_max_store_size_per_family")]
    pub max_store_size_per_family: u64,

    /// Seconds a swap-in reservation stays valid
    pub swap_in_validity_period: u64,

    /// Number of SPs allowed in an exiting state at the same time
    pub sp_concurrent_exit_num: u32,
}

fn default_gvg_staking_per_bytes() -> u128 {
    DEFAULT_GVG_STAKING_PER_BYTES
}

fn default_max_store_size_per_family() -> u64 {
    DEFAULT_MAX_STORE_SIZE_PER_FAMILY
}

impl Default for Params {
    fn default() -> Self {
        Params {
            deposit_denom: DEFAULT_DEPOSIT_DENOM.to_string(),
            gvg_staking_per_bytes: DEFAULT_GVG_STAKING_PER_BYTES,
            max_global_virtual_group_num_per_family: DEFAULT_MAX_GVG_NUM_PER_FAMILY,
            max_store_size_per_family: DEFAULT_MAX_STORE_SIZE_PER_FAMILY,
            swap_in_validity_period: DEFAULT_SWAP_IN_VALIDITY_PERIOD,
            sp_concurrent_exit_num: DEFAULT_SP_CONCURRENT_EXIT_NUM,
        }
    }
}

impl Params {
    /// Validate the params
    pub fn validate(&self) -> Result<()> {
        if self.deposit_denom.trim().is_empty() {
            return Err(Error::InvalidParams("deposit denom must not be empty".to_string()));
        }

        if self.max_global_virtual_group_num_per_family == 0 {
            return Err(Error::InvalidParams(
                "max global virtual group num per family must be greater than 0".to_string(),
            ));
        }

        if self.max_store_size_per_family == 0 {
            return Err(Error::InvalidParams(
                "max store size per family must be greater than 0".to_string(),
            ));
        }

        if self.swap_in_validity_period == 0 {
            return Err(Error::InvalidParams(
                "swap in validity period must be greater than 0".to_string(),
            ));
        }

        if self.sp_concurrent_exit_num == 0 {
            return Err(Error::InvalidParams(
                "sp concurrent exit num must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the group store
    #[serde(default)]
    pub data_dir: PathBuf,

    /// Governance authority allowed to update params and force exits
    pub authority: Address,

    /// Account receiving deposits forfeited by forced exits
    pub governance_address: Address,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Genesis module params
    #[serde(default)]
    pub params: Params,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: default_data_dir(),
            authority: Address::default(),
            governance_address: Address::default(),
            logging: LoggingConfig::default(),
            params: Params::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("virtualgroup")
}

/// Whether a path names a YAML file
fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    )
}

impl Config {
    /// Load configuration from a file (YAML or JSON), with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let content = std::fs::read_to_string(path_ref).map_err(|e| {
            Error::Config(format!("Failed to read config file: {}", e))
        })?;

        let content = Self::substitute_env_vars(&content);

        let mut config: Config = if is_yaml(path_ref) {
            serde_yaml::from_str(&content).map_err(|e| {
                Error::Config(format!("Failed to parse YAML config: {}", e))
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| {
                Error::Config(format!("Failed to parse JSON config: {}", e))
            })?
        };

        if config.data_dir == PathBuf::new() {
            config.data_dir = default_data_dir();
        }

        config.validate()?;
        Ok(config)
    }

    /// Substitute environment variables in config content
    /// Supports ${VAR_NAME} syntax
    fn substitute_env_vars(content: &str) -> String {
        let mut result = content.to_string();

        let re = match regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") {
            Ok(re) => re,
            Err(_) => return result,
        };

        for cap in re.captures_iter(content) {
            let full_match = &cap[0];
            let var_name = &cap[1];

            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(full_match, &value);
            }
        }

        result
    }

    /// Save configuration to a file (format determined by extension)
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path_ref = path.as_ref();

        let content = if is_yaml(path_ref) {
            serde_yaml::to_string(self).map_err(|e| {
                Error::Config(format!("Failed to serialize config to YAML: {}", e))
            })?
        } else {
            serde_json::to_string_pretty(self).map_err(|e| {
                Error::Config(format!("Failed to serialize config to JSON: {}", e))
            })?
        };

        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path_ref, content).map_err(|e| {
            Error::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.authority == Address::default() {
            return Err(Error::InvalidConfig("authority address is required".to_string()));
        }

        if self.governance_address == Address::default() {
            return Err(Error::InvalidConfig(
                "governance address is required".to_string(),
            ));
        }

        self.params
            .validate()
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Path of the group store database
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("groups.db")
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config(dir: &Path) -> Config {
        Config {
            data_dir: dir.to_path_buf(),
            authority: Address::new([1; 20]),
            governance_address: Address::new([2; 20]),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_params_are_valid() {
        Params::default().validate().unwrap();
    }

    #[test]
    fn test_params_validation() {
        let mut params = Params::default();
        params.deposit_denom = " ".to_string();
        assert!(matches!(params.validate(), Err(Error::InvalidParams(_))));

        let mut params = Params::default();
        params.sp_concurrent_exit_num = 0;
        assert!(params.validate().is_err());

        let mut params = Params::default();
        params.swap_in_validity_period = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_default_config_requires_addresses() {
        assert!(matches!(
            Config::default().validate(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = sample_config(dir.path());
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.authority, config.authority);
        assert_eq!(loaded.params, config.params);
    }

    #[test]
    fn test_yaml_with_env_substitution() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::env::set_var("VG_TEST_AUTHORITY", "0x0303030303030303030303030303030303030303");

        let yaml = format!(
            "data_dir: {}\n\
             authority: \"${{VG_TEST_AUTHORITY}}\"\n\
             governance_address: \"0x0404040404040404040404040404040404040404\"\n\
             params:\n  \
               deposit_denom: BNB\n  \
               max_global_virtual_group_num_per_family: 4\n  \
               swap_in_validity_period: 60\n  \
               sp_concurrent_exit_num: 2\n",
            dir.path().display()
        );
        std::fs::write(&path, yaml).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.authority, Address::new([3; 20]));
        assert_eq!(config.params.max_global_virtual_group_num_per_family, 4);
        assert_eq!(config.params.gvg_staking_per_bytes, DEFAULT_GVG_STAKING_PER_BYTES);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_logging_section_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let yaml = format!(
            "data_dir: {}\n\
             authority: \"0x0101010101010101010101010101010101010101\"\n\
             governance_address: \"0x0202020202020202020202020202020202020202\"\n\
             logging:\n  \
               level: warn\n  \
               file: {}\n",
            dir.path().display(),
            dir.path().join("vgctl.log").display()
        );
        std::fs::write(&path, yaml).unwrap();

        let logging = Config::load(&path).unwrap().logging;
        assert_eq!(logging.level.parse::<tracing::Level>().unwrap(), tracing::Level::WARN);
        assert_eq!(logging.file, Some(dir.path().join("vgctl.log")));
    }
}
