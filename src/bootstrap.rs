//! Idempotent certificate bootstrap.
//!
//! Ensures `<dir>/<domain>.key` and `<dir>/<domain>.crt` exist, generating
//! them only when they are not both present. State lives entirely on disk:
//! every run re-stats the two paths, so the guarantee survives restarts.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use time::OffsetDateTime;

use crate::cert::generate::issue_self_signed;
use crate::cert::inspect::inspect_files;
use crate::cert::profile::{CertificateProfile, SanEntry};
use crate::config::{BootstrapConfig, PartialPolicy};
use crate::error::{BootstrapError, Result};
use crate::fs_ops::{CERT_FILE_MODE, DirLock, KEY_FILE_MODE, write_file_atomic};
use crate::progress::{Phase, Progress, ProgressSink, Silent};

/// Deterministic locations of the key and certificate for one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlePaths {
    pub dir: PathBuf,
    pub key: PathBuf,
    pub cert: PathBuf,
}

impl BundlePaths {
    pub fn new(dir: &Path, domain: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            key: dir.join(format!("{domain}.key")),
            cert: dir.join(format!("{domain}.crt")),
        }
    }

    pub fn state(&self) -> MaterialState {
        match (self.key.exists(), self.cert.exists()) {
            (false, false) => MaterialState::Absent,
            (true, false) => MaterialState::KeyOnly,
            (false, true) => MaterialState::CertOnly,
            (true, true) => MaterialState::Present,
        }
    }
}

/// What is on disk for a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialState {
    /// Neither file exists
    Absent,
    KeyOnly,
    CertOnly,
    /// Both files exist; nothing will be touched
    Present,
}

/// Result of a bootstrap run.
#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    pub domain: String,
    pub paths: BundlePaths,
    /// `false` when existing material was left in place
    pub generated: bool,
    pub subject_alt_names: Vec<SanEntry>,
    /// Validity window, when the certificate could be read
    pub validity: Option<(OffsetDateTime, OffsetDateTime)>,
}

impl std::fmt::Display for BootstrapOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = if self.generated { "generated" } else { "already present" };
        writeln!(f, "Certificate for {} {verb}", self.domain)?;
        writeln!(f, "  key:         {}", self.paths.key.display())?;
        writeln!(f, "  certificate: {}", self.paths.cert.display())?;
        match self.validity {
            Some((not_before, not_after)) => writeln!(
                f,
                "  valid:       {not_before} .. {not_after} ({} days)",
                (not_after - not_before).whole_days()
            )?,
            None => writeln!(f, "  valid:       unknown (certificate unreadable)")?,
        }
        let names: Vec<String> = self.subject_alt_names.iter().map(ToString::to_string).collect();
        write!(f, "  covers:      {}", names.join(", "))
    }
}

/// Runs the ensure procedure for one configured domain.
#[derive(Debug, Clone)]
pub struct Bootstrapper {
    profile: CertificateProfile,
    paths: BundlePaths,
    on_partial: PartialPolicy,
}

impl Bootstrapper {
    pub fn new(config: &BootstrapConfig) -> Result<Self> {
        config.validate()?;
        let profile = CertificateProfile::from_config(config)?;
        let paths = BundlePaths::new(&config.cert_dir, profile.domain());
        Ok(Self {
            profile,
            paths,
            on_partial: config.on_partial,
        })
    }

    pub fn profile(&self) -> &CertificateProfile {
        &self.profile
    }

    pub fn paths(&self) -> &BundlePaths {
        &self.paths
    }

    /// Ensure a key + certificate pair exists, generating one if needed.
    pub fn ensure(&self, sink: &mut dyn ProgressSink) -> Result<BootstrapOutcome> {
        let dir = &self.paths.dir;

        sink.report(Progress::directory(dir));
        fs::create_dir_all(dir).map_err(|e| {
            BootstrapError::environment(
                format!("Failed to create certificate directory {}", dir.display()),
                e,
            )
        })?;

        // Fast path without the lock
        if self.paths.state() == MaterialState::Present {
            return Ok(self.existing(sink));
        }

        let _lock = DirLock::acquire(dir)?;

        // Another process may have finished while we waited for the lock
        match self.paths.state() {
            MaterialState::Present => return Ok(self.existing(sink)),
            MaterialState::Absent => {}
            MaterialState::KeyOnly => self.handle_partial(&self.paths.key, &self.paths.cert)?,
            MaterialState::CertOnly => self.handle_partial(&self.paths.cert, &self.paths.key)?,
        }

        let issued = issue_self_signed(&self.profile, sink)?;

        sink.report(Progress::new(
            Phase::Writing,
            format!(
                "Writing {} and {}",
                self.paths.key.display(),
                self.paths.cert.display()
            ),
        ));

        // A stale certificate must never sit next to a freshly written key
        if self.paths.cert.exists() {
            fs::remove_file(&self.paths.cert).map_err(|e| {
                BootstrapError::environment(
                    format!("Failed to remove stale {}", self.paths.cert.display()),
                    e,
                )
            })?;
        }
        write_file_atomic(&self.paths.key, issued.key_pem.as_bytes(), KEY_FILE_MODE)?;
        // Certificate goes last: both files present implies both complete
        write_file_atomic(&self.paths.cert, issued.cert_pem.as_bytes(), CERT_FILE_MODE)?;

        let outcome = BootstrapOutcome {
            domain: self.profile.domain().to_string(),
            paths: self.paths.clone(),
            generated: true,
            subject_alt_names: self.profile.subject_alt_names(),
            validity: Some((issued.not_before, issued.not_after)),
        };

        info!(
            "Generated certificate for {} at {}",
            outcome.domain,
            self.paths.cert.display()
        );
        sink.report(Progress::new(
            Phase::Complete,
            format!(
                "Certificate valid until {} for {} names",
                issued.not_after,
                outcome.subject_alt_names.len()
            ),
        ));

        Ok(outcome)
    }

    fn handle_partial(&self, present: &Path, missing: &Path) -> Result<()> {
        match self.on_partial {
            PartialPolicy::Fail => Err(BootstrapError::PartialMaterial {
                present: present.to_path_buf(),
                missing: missing.to_path_buf(),
            }),
            PartialPolicy::Regenerate => {
                warn!(
                    "Found {} without {}, regenerating both",
                    present.display(),
                    missing.display()
                );
                Ok(())
            }
        }
    }

    fn existing(&self, sink: &mut dyn ProgressSink) -> BootstrapOutcome {
        sink.report(Progress::existing(&self.paths.key, &self.paths.cert));

        let (subject_alt_names, validity) = match inspect_files(&self.paths.cert, None) {
            Ok(report) => (
                report.subject_alt_names,
                Some((report.not_before, report.not_after)),
            ),
            Err(e) => {
                warn!("Leaving existing certificate untouched: {e}");
                (Vec::new(), None)
            }
        };

        BootstrapOutcome {
            domain: self.profile.domain().to_string(),
            paths: self.paths.clone(),
            generated: false,
            subject_alt_names,
            validity,
        }
    }
}

/// Run the bootstrap for `config` without progress output.
pub fn ensure(config: &BootstrapConfig) -> Result<BootstrapOutcome> {
    Bootstrapper::new(config)?.ensure(&mut Silent)
}
