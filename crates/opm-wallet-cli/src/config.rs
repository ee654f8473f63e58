//! Wallet configuration, parsed from a TOML file with environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use opm_wallet_core::crypto::{
    KdfParams, ARGON2_DEFAULT_ITERATIONS, ARGON2_DEFAULT_MEMORY_KIB, ARGON2_DEFAULT_PARALLELISM,
    PBKDF2_DEFAULT_ITERATIONS,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub wallet: WalletSection,

    /// Password key derivation
    #[serde(default)]
    pub kdf: KdfSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSection {
    /// Where backup files are written
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Where the connected-session file lives
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for WalletSection {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfSection {
    /// "pbkdf2-sha256" or "argon2id"
    #[serde(default = "default_kdf_algorithm")]
    pub algorithm: String,

    /// PBKDF2 iterations, or Argon2id passes
    pub iterations: Option<u32>,

    /// Argon2id memory in KiB
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,

    /// Argon2id lanes
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for KdfSection {
    fn default() -> Self {
        Self {
            algorithm: default_kdf_algorithm(),
            iterations: None,
            memory_kib: default_memory_kib(),
            parallelism: default_parallelism(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_backup_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".opm-wallet")
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_kdf_algorithm() -> String {
    "pbkdf2-sha256".to_string()
}

fn default_memory_kib() -> u32 {
    ARGON2_DEFAULT_MEMORY_KIB
}

fn default_parallelism() -> u32 {
    ARGON2_DEFAULT_PARALLELISM
}

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

// ============================================================================
// Loading & environment override
// ============================================================================

impl WalletConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: WalletConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise start from defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `OPM_WALLET_BACKUP_DIR`
    /// - `OPM_WALLET_DATA_DIR`
    /// - `OPM_WALLET_LOG_LEVEL`
    /// - `OPM_WALLET_KDF`
    /// - `OPM_WALLET_KDF_ITERATIONS`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("OPM_WALLET_BACKUP_DIR") {
            self.wallet.backup_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("OPM_WALLET_DATA_DIR") {
            self.wallet.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("OPM_WALLET_LOG_LEVEL") {
            self.wallet.log_level = v;
        }
        if let Ok(v) = std::env::var("OPM_WALLET_KDF") {
            self.kdf.algorithm = v;
        }
        if let Ok(v) = std::env::var("OPM_WALLET_KDF_ITERATIONS") {
            if let Ok(iterations) = v.parse::<u32>() {
                self.kdf.iterations = Some(iterations);
            }
        }
    }

    /// KDF parameters new backups are encrypted with.
    pub fn kdf_params(&self) -> Result<KdfParams> {
        let params = match self.kdf.algorithm.as_str() {
            "pbkdf2-sha256" | "pbkdf2" => KdfParams::Pbkdf2Sha256 {
                iterations: self.kdf.iterations.unwrap_or(PBKDF2_DEFAULT_ITERATIONS),
            },
            "argon2id" | "argon2" => KdfParams::Argon2id {
                memory_kib: self.kdf.memory_kib,
                iterations: self.kdf.iterations.unwrap_or(ARGON2_DEFAULT_ITERATIONS),
                parallelism: self.kdf.parallelism,
            },
            other => anyhow::bail!("kdf.algorithm must be pbkdf2-sha256 or argon2id, got {}", other),
        };
        Ok(params)
    }

    pub fn session_file(&self) -> PathBuf {
        self.wallet.data_dir.join("session.json")
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            LOG_LEVELS.contains(&self.wallet.log_level.to_lowercase().as_str()),
            "wallet.log_level must be one of {}",
            LOG_LEVELS.join(", ")
        );

        let kdf = self.kdf_params()?;
        kdf.validate().context("kdf is too weak")?;
        anyhow::ensure!(!kdf.exceeds_limits(), "kdf cost is out of range");

        anyhow::ensure!(
            !self.wallet.backup_dir.as_os_str().is_empty(),
            "wallet.backup_dir must not be empty"
        );

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use opm_wallet_core::crypto::{ARGON2_MAX_MEMORY_KIB, ARGON2_MIN_MEMORY_KIB};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = WalletConfig::load(None).unwrap();
        assert_eq!(config.wallet.backup_dir, PathBuf::from("."));
        assert_eq!(config.kdf_params().unwrap(), KdfParams::default());
        assert_eq!(config.session_file(), PathBuf::from(".opm-wallet/session.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_empty_file() {
        let file = write_config("");
        let config = WalletConfig::from_file(file.path()).unwrap();
        assert_eq!(config.wallet.log_level, "warn");
        assert_eq!(config.kdf.algorithm, "pbkdf2-sha256");
    }

    #[test]
    fn test_parse_full_config() {
        let file = write_config(
            r#"
[wallet]
backup_dir = "/backups"
data_dir = "/var/lib/opm-wallet"
log_level = "debug"

[kdf]
algorithm = "argon2id"
iterations = 4
memory_kib = 131072
parallelism = 2
"#,
        );

        let config = WalletConfig::from_file(file.path()).unwrap();
        assert_eq!(config.wallet.backup_dir, PathBuf::from("/backups"));
        assert_eq!(
            config.session_file(),
            PathBuf::from("/var/lib/opm-wallet/session.json")
        );
        assert_eq!(
            config.kdf_params().unwrap(),
            KdfParams::Argon2id {
                memory_kib: 131072,
                iterations: 4,
                parallelism: 2,
            }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = WalletConfig::default();

        std::env::set_var("OPM_WALLET_BACKUP_DIR", "/env/backups");
        std::env::set_var("OPM_WALLET_KDF", "argon2id");
        std::env::set_var("OPM_WALLET_KDF_ITERATIONS", "5");

        config.apply_env_overrides();

        assert_eq!(config.wallet.backup_dir, PathBuf::from("/env/backups"));
        assert_eq!(
            config.kdf_params().unwrap(),
            KdfParams::Argon2id {
                memory_kib: ARGON2_DEFAULT_MEMORY_KIB,
                iterations: 5,
                parallelism: ARGON2_DEFAULT_PARALLELISM,
            }
        );

        std::env::remove_var("OPM_WALLET_BACKUP_DIR");
        std::env::remove_var("OPM_WALLET_KDF");
        std::env::remove_var("OPM_WALLET_KDF_ITERATIONS");
    }

    #[test]
    fn test_validation_weak_kdf() {
        let file = write_config("[kdf]\niterations = 1000\n");
        let config = WalletConfig::from_file(file.path()).unwrap();
        assert!(config.validate().is_err());

        let file = write_config(&format!(
            "[kdf]\nalgorithm = \"argon2id\"\nmemory_kib = {}\n",
            ARGON2_MIN_MEMORY_KIB - 1
        ));
        let config = WalletConfig::from_file(file.path()).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_excessive_kdf() {
        let file = write_config("[kdf]\niterations = 50000000\n");
        let config = WalletConfig::from_file(file.path()).unwrap();
        assert!(config.validate().is_err());

        let file = write_config(&format!(
            "[kdf]\nalgorithm = \"argon2id\"\nmemory_kib = {}\n",
            ARGON2_MAX_MEMORY_KIB + 1
        ));
        let config = WalletConfig::from_file(file.path()).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_unknown_values() {
        let file = write_config("[kdf]\nalgorithm = \"scrypt\"\n");
        let config = WalletConfig::from_file(file.path()).unwrap();
        assert!(config.kdf_params().is_err());
        assert!(config.validate().is_err());

        let file = write_config("[wallet]\nlog_level = \"verbose\"\n");
        let config = WalletConfig::from_file(file.path()).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = WalletConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let reparsed: WalletConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(reparsed.kdf.algorithm, config.kdf.algorithm);
        assert_eq!(reparsed.wallet.data_dir, config.wallet.data_dir);
    }
}
