//! Configuration for the run reader.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for loading a run and reading its products.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Keep query buffers between reads of the same shape.
    pub reuse_buffers: bool,

    /// Check at load time that the decomposition tiles the domain.
    pub validate_tiling: bool,

    /// Load the EOS archive when it is present.
    pub load_eos: bool,

    /// Explicit EOS archive path. Defaults to
    /// `<run>/input_data/eos_table_sero.npz`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eos_archive: Option<PathBuf>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            reuse_buffers: true,
            validate_tiling: true,
            load_eos: true,
            eos_archive: None,
        }
    }
}

impl ReaderConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("R2D2_REUSE_BUFFERS") {
            config.reuse_buffers = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("R2D2_VALIDATE_TILING") {
            config.validate_tiling = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("R2D2_LOAD_EOS") {
            config.load_eos = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("R2D2_EOS_ARCHIVE") {
            if !val.is_empty() {
                config.eos_archive = Some(PathBuf::from(val));
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(path) = &self.eos_archive {
            if !self.load_eos {
                return Err("eos_archive is set but load_eos is false".to_string());
            }
            if path.as_os_str().is_empty() {
                return Err("eos_archive must not be empty".to_string());
            }
        }

        Ok(())
    }
}

fn parse_flag(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReaderConfig::default();
        assert!(config.reuse_buffers);
        assert!(config.validate_tiling);
        assert!(config.load_eos);
        assert!(config.eos_archive.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ReaderConfig {
            eos_archive: Some(PathBuf::from("/data/eos.npz")),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.load_eos = false;
        assert!(config.validate().is_err());

        config.load_eos = true;
        config.eos_archive = Some(PathBuf::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("off"));
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = ReaderConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("eos_archive"));
        let back: ReaderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.reuse_buffers, config.reuse_buffers);
    }
}
