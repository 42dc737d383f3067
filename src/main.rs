mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use time::OffsetDateTime;

use proxycert::cert::inspect_files;
use proxycert::progress::Console;
use proxycert::{BootstrapConfig, Bootstrapper, MaterialState};

fn main() {
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    match real_main() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when the command ran but the answer is "not usable".
fn real_main() -> Result<bool> {
    let args = cli::Args::parse();

    let cfg = BootstrapConfig::resolve(args.config.as_deref(), args.domain, args.dir)
        .context("Failed to load configuration")?;

    match args.sub.unwrap_or(cli::Cmd::Ensure) {
        cli::Cmd::Ensure => handle_ensure(&cfg),
        cli::Cmd::Inspect => handle_inspect(&cfg),
        cli::Cmd::Config => {
            print!("{}", cfg.to_toml()?);
            Ok(true)
        }
    }
}

fn handle_ensure(cfg: &BootstrapConfig) -> Result<bool> {
    let bootstrapper = Bootstrapper::new(cfg).context("Invalid bootstrap configuration")?;
    info!(
        "Ensuring TLS material for {} in {}",
        bootstrapper.profile().domain(),
        cfg.cert_dir.display()
    );

    let outcome = bootstrapper
        .ensure(&mut Console)
        .context("Certificate bootstrap failed")?;

    println!("{outcome}");
    Ok(true)
}

fn handle_inspect(cfg: &BootstrapConfig) -> Result<bool> {
    let bootstrapper = Bootstrapper::new(cfg).context("Invalid bootstrap configuration")?;
    let paths = bootstrapper.paths();

    if bootstrapper.paths().state() != MaterialState::Present {
        println!(
            "Incomplete material for {}: key {} ({}), certificate {} ({})",
            bootstrapper.profile().domain(),
            paths.key.display(),
            presence(paths.key.exists()),
            paths.cert.display(),
            presence(paths.cert.exists()),
        );
        return Ok(false);
    }

    let report = inspect_files(&paths.cert, Some(&paths.key))
        .with_context(|| format!("Failed to inspect {}", paths.cert.display()))?;

    let names: Vec<String> = report.subject_alt_names.iter().map(ToString::to_string).collect();
    println!("certificate: {}", paths.cert.display());
    println!("  subject CN:  {}", report.common_name.as_deref().unwrap_or("-"));
    println!("  covers:      {}", names.join(", "));
    println!(
        "  valid:       {} .. {} ({} days)",
        report.not_before,
        report.not_after,
        report.validity_days()
    );
    println!(
        "  key:         RSA {} bits, matches certificate: {}",
        report
            .rsa_key_bits
            .map(|bits| bits.to_string())
            .unwrap_or_else(|| "?".to_string()),
        report.key_matches.map_or("unknown", |m| if m { "yes" } else { "no" })
    );
    println!(
        "  usage:       keyEncipherment={} dataEncipherment={} serverAuth={}",
        report.key_encipherment, report.data_encipherment, report.server_auth
    );
    println!("  sha256:      {}", report.fingerprint_sha256);

    let findings = report.check_against(bootstrapper.profile(), OffsetDateTime::now_utc());
    for finding in &findings {
        println!("  problem:     {finding}");
    }
    Ok(findings.is_empty())
}

fn presence(exists: bool) -> &'static str {
    if exists { "present" } else { "missing" }
}
