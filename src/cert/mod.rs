//! Certificate profile, issuance, and inspection
//!
//! Everything here works on in-memory PEM text; only `inspect_files` reads
//! from disk, and nothing in this module writes.

pub mod generate;
pub mod inspect;
pub mod profile;

pub use generate::{IssuedCertificate, issue_self_signed};
pub use inspect::{CertificateReport, Finding, inspect_files, inspect_pem};
pub use profile::{CertificateProfile, SanEntry, wildcard_for};
