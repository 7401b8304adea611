//! Front-end configuration with environment variable support.
//!
//! This module provides [`Config`] for the command-line settings that sit
//! around the core operations. The library calls themselves never read the
//! environment; they take [`EncryptOptions`]/[`DecryptOptions`] built here.
//!
//! ## Environment Variables
//!
//! - `GENC_CONFIG`: Override config file path
//! - `GENC_MIN_PASSPHRASE_LEN`: Override the minimum passphrase length
//! - `GENC_DELETE_ORIGIN`: Remove source files after encryption (`true`/`false`)
//! - `GENC_STRICT`: Reject truncated containers (`true`/`false`)

use crate::file_ops::{DecryptOptions, EncryptOptions};
use crate::streaming::TruncationPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

pub const ENV_CONFIG_PATH: &str = "GENC_CONFIG";
pub const ENV_MIN_PASSPHRASE_LEN: &str = "GENC_MIN_PASSPHRASE_LEN";
pub const ENV_DELETE_ORIGIN: &str = "GENC_DELETE_ORIGIN";
pub const ENV_STRICT: &str = "GENC_STRICT";

pub const DEFAULT_MIN_PASSPHRASE_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub min_passphrase_len: usize,
    pub delete_origin: bool,
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_passphrase_len: DEFAULT_MIN_PASSPHRASE_LEN,
            delete_origin: false,
            strict: false,
        }
    }
}

impl Config {
    /// Load config from file path
    pub fn load(path: &str) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load config with environment variable overrides
    /// Priority: ENV vars > config file > defaults
    pub fn load_with_env(path: Option<&str>) -> Result<Self> {
        let config_path = path
            .map(String::from)
            .or_else(|| env::var(ENV_CONFIG_PATH).ok());

        let mut config = match config_path {
            Some(ref p) if Path::new(p).exists() => {
                info!(path = p, "loading config from file");
                Self::read_file(p)?
            }
            Some(ref p) => {
                warn!(path = p, "config file not found, using defaults");
                Config::default()
            }
            None => {
                debug!("using default configuration");
                Config::default()
            }
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &str) -> Result<Self> {
        let s =
            fs::read_to_string(path).with_context(|| format!("reading config file {}", path))?;
        serde_json::from_str(&s).with_context(|| format!("parsing config file {}", path))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = env::var(ENV_MIN_PASSPHRASE_LEN) {
            debug!(value = %value, "overriding min_passphrase_len from environment");
            self.min_passphrase_len = value
                .trim()
                .parse()
                .with_context(|| {
                    format!("{} must be a number, got {:?}", ENV_MIN_PASSPHRASE_LEN, value)
                })?;
        }

        if let Ok(value) = env::var(ENV_DELETE_ORIGIN) {
            debug!(value = %value, "overriding delete_origin from environment");
            self.delete_origin = parse_flag(ENV_DELETE_ORIGIN, &value)?;
        }

        if let Ok(value) = env::var(ENV_STRICT) {
            debug!(value = %value, "overriding strict from environment");
            self.strict = parse_flag(ENV_STRICT, &value)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_passphrase_len == 0 {
            anyhow::bail!("min_passphrase_len must be at least 1");
        }

        if self.min_passphrase_len < DEFAULT_MIN_PASSPHRASE_LEN {
            warn!(
                min_passphrase_len = self.min_passphrase_len,
                "minimum passphrase length is below the recommended {}",
                DEFAULT_MIN_PASSPHRASE_LEN
            );
        }

        Ok(())
    }

    /// Caller-side passphrase policy; counted in characters
    pub fn check_passphrase(&self, passphrase: &str) -> Result<()> {
        let len = passphrase.chars().count();
        if len == 0 {
            anyhow::bail!("passphrase cannot be empty");
        }
        if len < self.min_passphrase_len {
            anyhow::bail!(
                "passphrase must be at least {} characters, got {}",
                self.min_passphrase_len,
                len
            );
        }
        Ok(())
    }

    pub fn encrypt_options(&self) -> EncryptOptions {
        EncryptOptions::new().with_delete_origin(self.delete_origin)
    }

    pub fn decrypt_options(&self) -> DecryptOptions {
        let truncation = if self.strict {
            TruncationPolicy::Strict
        } else {
            TruncationPolicy::Tolerate
        };
        DecryptOptions::new().with_truncation(truncation)
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("{} must be true or false, got {:?}", name, other),
    }
}
