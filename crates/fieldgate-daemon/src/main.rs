//! Gateway daemon entry point.
//!
//! Wires the service kernel to the command line, logging, and Unix signals.

use anyhow::{Context, Result};
use clap::Parser;
use fieldgate_common::ServiceConfig;
use fieldgate_daemon::service::Service;
use fieldgate_daemon::signals;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Gateway daemon command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "fieldgated",
    about = "Fieldbus gateway daemon - UDP control plane for a cyclic EtherCAT-style master",
    version,
    long_about = None
)]
struct Args {
    /// Path to a service configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Fieldbus interface name (overrides config).
    #[arg(long, short = 'i', value_name = "IF")]
    interface: Option<String>,

    /// UDP control port (overrides config).
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Enable verbose logging.
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose);

    info!(version = env!("CARGO_PKG_VERSION"), "fieldgate starting");

    let mut config = load_config(&args)?;

    if let Some(interface) = &args.interface {
        config.network.interface = interface.clone();
        info!(%interface, "interface override");
    }
    if let Some(port) = args.port {
        config.security.port = port;
        info!(port, "port override");
    }

    warn_if_root();

    signals::install();

    let mut service = Service::init(config).context("failed to initialise service")?;
    service.start().context("failed to start service")?;

    info!("service running - send SIGTERM or SIGINT to stop");

    while !signals::shutdown_requested() {
        std::thread::sleep(Duration::from_secs(1));
    }

    info!("shutting down");
    service.stop();
    service.cleanup();

    info!("fieldgate stopped");
    Ok(())
}

/// Initialize logging with the requested verbosity.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = format!(
        "fieldgate_daemon={level},fieldgate_fieldbus={level},fieldgate_protocol={level},fieldgate_common={level}"
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Load configuration from file or fall back to the built-in defaults.
/// A missing file is a warning; an unparsable one is a startup failure.
fn load_config(args: &Args) -> Result<ServiceConfig> {
    match &args.config {
        Some(path) if path.exists() => ServiceConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        Some(path) => {
            warn!(path = %path.display(), "config file not found, using built-in defaults");
            Ok(ServiceConfig::default())
        }
        None => {
            info!("no config file specified, using built-in defaults");
            Ok(ServiceConfig::default())
        }
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn warn_if_root() {
    // SAFETY: geteuid has no preconditions
    if unsafe { libc::geteuid() } == 0 {
        warn!("running as root - this may be required for raw bus access");
    }
}

#[cfg(not(unix))]
fn warn_if_root() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["fieldgated", "--verbose"]);
        assert!(args.verbose);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_args_with_overrides() {
        let args = Args::parse_from(["fieldgated", "-c", "gate.toml", "-i", "enp3s0", "-p", "9000"]);
        assert_eq!(args.config, Some(PathBuf::from("gate.toml")));
        assert_eq!(args.interface, Some("enp3s0".into()));
        assert_eq!(args.port, Some(9000));
    }

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let args = Args::parse_from(["fieldgated", "-c", "/nonexistent/gate.toml"]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.security.port, 2346);
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[network").unwrap();

        let args = Args::parse_from([
            "fieldgated",
            "-c",
            file.path().to_str().unwrap(),
        ]);
        assert!(load_config(&args).is_err());
    }
}
