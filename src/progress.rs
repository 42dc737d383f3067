//! Bootstrap progress reporting

use std::path::Path;

/// Phases of a bootstrap run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Directory,    // Ensuring the output directory exists
    Existing,     // Found a complete pair, nothing to do
    GeneratingKey,
    BuildingRequest,
    Signing,
    Writing,
    Complete,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Directory => "directory",
            Phase::Existing => "existing",
            Phase::GeneratingKey => "key",
            Phase::BuildingRequest => "request",
            Phase::Signing => "sign",
            Phase::Writing => "write",
            Phase::Complete => "complete",
        }
    }
}

/// A single progress line.
#[derive(Debug, Clone)]
pub struct Progress {
    pub phase: Phase,
    pub message: String,
}

impl Progress {
    pub fn new(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
        }
    }

    pub fn directory(dir: &Path) -> Self {
        Self::new(
            Phase::Directory,
            format!("Ensuring certificate directory {}", dir.display()),
        )
    }

    pub fn existing(key: &Path, cert: &Path) -> Self {
        Self::new(
            Phase::Existing,
            format!(
                "Certificate already exists ({}, {}), skipping generation",
                key.display(),
                cert.display()
            ),
        )
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.phase.label(), self.message)
    }
}

/// Receives progress as the bootstrap runs.
pub trait ProgressSink {
    fn report(&mut self, progress: Progress);
}

/// Drops every update.
pub struct Silent;

impl ProgressSink for Silent {
    fn report(&mut self, _progress: Progress) {}
}

/// Writes each update to stdout and the log.
pub struct Console;

impl ProgressSink for Console {
    fn report(&mut self, progress: Progress) {
        log::debug!("{}: {}", progress.phase.label(), progress.message);
        println!("{progress}");
    }
}

impl ProgressSink for Vec<Progress> {
    fn report(&mut self, progress: Progress) {
        self.push(progress);
    }
}
