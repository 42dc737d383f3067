use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BootstrapError, Result};

/// Domain used when nothing else is configured.
pub const DEFAULT_DOMAIN: &str = "dev.local";
/// Output directory used when nothing else is configured.
pub const DEFAULT_CERT_DIR: &str = "ssl";
pub const DEFAULT_VALIDITY_DAYS: u32 = 365;

/// Upper bound accepted for `validity_days` (ten years).
pub const MAX_VALIDITY_DAYS: u32 = 3650;

pub const ENV_DOMAIN: &str = "PROXYCERT_DOMAIN";
pub const ENV_CERT_DIR: &str = "PROXYCERT_DIR";

/// Top‑level bootstrap configuration, as read from `proxycert.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Primary domain the certificate is issued for
    pub domain: String,
    /// Directory holding `<domain>.key` and `<domain>.crt`
    pub cert_dir: PathBuf,
    pub validity_days: u32,
    /// What to do when only one of the two files exists
    pub on_partial: PartialPolicy,
    pub subject: SubjectConfig,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            cert_dir: PathBuf::from(DEFAULT_CERT_DIR),
            validity_days: DEFAULT_VALIDITY_DAYS,
            on_partial: PartialPolicy::default(),
            subject: SubjectConfig::default(),
        }
    }
}

/// Handling of a key without a certificate (or the reverse).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialPolicy {
    /// Discard the surviving file and generate a fresh pair
    #[default]
    Regenerate,
    /// Abort without touching anything
    Fail,
}

/// Fixed distinguished-name placeholders. CN and email derive from the domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectConfig {
    pub country: String,
    pub state: String,
    pub locality: String,
    pub organization: String,
    pub organizational_unit: String,
}

impl Default for SubjectConfig {
    fn default() -> Self {
        Self {
            country: "US".to_string(),
            state: "State".to_string(),
            locality: "City".to_string(),
            organization: "Development".to_string(),
            organizational_unit: "IT Department".to_string(),
        }
    }
}

impl BootstrapConfig {
    /// Load configuration from a TOML file. Missing keys fall back to defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            BootstrapError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let cfg: Self = toml::from_str(&raw).map_err(|e| {
            BootstrapError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        Ok(cfg)
    }

    /// Resolve the effective configuration.
    ///
    /// Precedence: explicit overrides, then `PROXYCERT_*` environment
    /// variables, then the config file (explicit path, or the per-user file
    /// if it exists), then built-in defaults.
    pub fn resolve(
        config_path: Option<&Path>,
        domain: Option<String>,
        cert_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let mut cfg = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => {
                    log::info!("Using config from: {}", path.display());
                    Self::load_from_file(&path)?
                }
                None => Self::default(),
            },
        };

        cfg.apply_env_overrides(|key| std::env::var(key).ok());

        if let Some(domain) = domain {
            cfg.domain = domain;
        }
        if let Some(dir) = cert_dir {
            cfg.cert_dir = dir;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `PROXYCERT_DOMAIN` / `PROXYCERT_DIR` through the given lookup.
    /// Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(domain) = lookup(ENV_DOMAIN).filter(|v| !v.trim().is_empty()) {
            self.domain = domain;
        }
        if let Some(dir) = lookup(ENV_CERT_DIR).filter(|v| !v.trim().is_empty()) {
            self.cert_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.domain.trim().is_empty() {
            return Err(BootstrapError::Config("domain must not be empty".into()));
        }
        if self.cert_dir.as_os_str().is_empty() {
            return Err(BootstrapError::Config("cert_dir must not be empty".into()));
        }
        if self.validity_days == 0 || self.validity_days > MAX_VALIDITY_DAYS {
            return Err(BootstrapError::Config(format!(
                "validity_days must be between 1 and {MAX_VALIDITY_DAYS}, got {}",
                self.validity_days
            )));
        }
        if self.subject.country.len() != 2 || !self.subject.country.is_ascii() {
            return Err(BootstrapError::Config(format!(
                "subject.country must be a two-letter code, got '{}'",
                self.subject.country
            )));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BootstrapError::Config(format!("failed to serialize config: {e}")))
    }
}

/// Per-user config file location (`<config dir>/proxycert/proxycert.toml`).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("proxycert").join("proxycert.toml"))
}
