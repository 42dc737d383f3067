//! proxycert: idempotent self-signed TLS bootstrap for a local reverse proxy.
//!
//! On each run the bootstrapper makes sure `<dir>/<domain>.key` and
//! `<dir>/<domain>.crt` exist. A complete pair is never touched; otherwise a
//! fresh RSA-2048 key and a 365-day self-signed certificate covering the
//! domain, `localhost`, the domain's wildcard and both loopback addresses are
//! generated in-process and committed atomically.

pub mod bootstrap;
pub mod cert;
pub mod config;
pub mod error;
pub mod fs_ops;
pub mod progress;

pub use bootstrap::{BootstrapOutcome, Bootstrapper, BundlePaths, MaterialState, ensure};
pub use config::{BootstrapConfig, PartialPolicy, SubjectConfig};
pub use error::{BootstrapError, Result};
