use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "Self-signed TLS certificate bootstrap for the local reverse proxy")]
pub struct Args {
    /// Domain to issue the certificate for (env: PROXYCERT_DOMAIN)
    #[arg(long, short = 'd', global = true)]
    pub domain: Option<String>,

    /// Directory holding <domain>.key and <domain>.crt (env: PROXYCERT_DIR)
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Sub‑commands (ensure, inspect, config)
    #[command(subcommand)]
    pub sub: Option<Cmd>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmd {
    /// Generate the key and certificate unless both already exist (default)
    Ensure,
    /// Check existing material (Exit 0 = usable, 1 = missing or invalid)
    Inspect,
    /// Print the effective configuration as TOML
    Config,
}
