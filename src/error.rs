//! Error taxonomy for the certificate bootstrap.

use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the bootstrap library.
///
/// Every variant is fatal for the invocation; nothing is retried.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Output directory could not be created, locked, or written.
    #[error("{context}: {source}")]
    Environment {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Key generation, key encoding, or signing failed.
    #[error("Cryptographic failure: {0}")]
    Crypto(String),

    #[error("Invalid domain '{domain}': {reason}")]
    InvalidDomain { domain: String, reason: String },

    /// Only one half of the bundle exists and the policy forbids repair.
    #[error(
        "Found {} without its counterpart {}; refusing to overwrite (on_partial = \"fail\")",
        .present.display(),
        .missing.display()
    )]
    PartialMaterial { present: PathBuf, missing: PathBuf },

    /// Existing material could not be parsed.
    #[error("Failed to inspect certificate: {0}")]
    Inspect(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl BootstrapError {
    pub(crate) fn environment(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Environment {
            context: context.into(),
            source,
        }
    }
}

impl From<rcgen::Error> for BootstrapError {
    fn from(err: rcgen::Error) -> Self {
        Self::Crypto(err.to_string())
    }
}

impl From<rsa::Error> for BootstrapError {
    fn from(err: rsa::Error) -> Self {
        Self::Crypto(err.to_string())
    }
}

pub type Result<T, E = BootstrapError> = std::result::Result<T, E>;
