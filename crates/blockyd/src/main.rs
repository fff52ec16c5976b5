// # blockyd - Blocky Daemon
//
// Thin integration layer over blocky-core. The daemon is responsible for:
// 1. Parsing CLI arguments and the configuration file
// 2. Initializing logging and the runtime
// 3. Startup checks (root, firewall tooling, chain, pidfile)
// 4. Installing the local-whitelist pass rule
// 5. Wiring resolver and firewall backends into the engine
//
// All blocklist logic lives in blocky-core; this binary only connects
// configuration to components and translates OS signals into engine
// shutdown.
//
// ## Usage
//
// ```bash
// blockyd --config /etc/blocky.conf
// blockyd -c ./blocky.conf --foreground   # log to stderr
// ```

use anyhow::{Context, Result};
use blocky_core::traits::DomainResolver;
use blocky_core::{BlockyConfig, BlockyEngine, EngineConfig, FirewallBackend, FirewallSpec};
use blocky_firewall_ipset::IpsetFirewall;
use blocky_resolver_hickory::HickoryResolver;
use clap::Parser;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

mod logging;
mod pidfile;

/// Name of the set holding whitelisted local addresses
const WHITELIST_SET_NAME: &str = "blocky_local_ip_whitelist";

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy)]
enum BlockyExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error
    ConfigError = 1,
    /// Startup check failure (privileges, tooling, chain, pidfile)
    StartupCheckError = 2,
    /// Runtime error (unexpected failure)
    RuntimeError = 3,
}

impl From<BlockyExitCode> for ExitCode {
    fn from(code: BlockyExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Keep a list of domains resolved into a firewall block set
#[derive(Debug, Parser)]
#[command(name = "blockyd", version, about)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "/etc/blocky.conf")]
    config: PathBuf,

    /// Stay attached and log to stderr instead of the configured sink
    #[arg(short, long)]
    foreground: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match BlockyConfig::load_from_path(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return BlockyExitCode::ConfigError.into();
        }
    };

    if let Err(e) = logging::init(&config.log, args.foreground) {
        eprintln!("Failed to initialize logging: {}", e);
        return BlockyExitCode::ConfigError.into();
    }

    info!("Starting blockyd");
    log_startup_notice(&args.config, &config);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return BlockyExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run(config)).into()
}

async fn run(config: BlockyConfig) -> BlockyExitCode {
    if let Err(e) = startup_checks(&config).await {
        error!("Startup check failed: {}", e);
        return BlockyExitCode::StartupCheckError;
    }

    let _pidfile = match pidfile::PidFile::create(&config.pidfile) {
        Ok(pidfile) => pidfile,
        Err(e) => {
            error!("{}", e);
            return BlockyExitCode::StartupCheckError;
        }
    };

    match run_daemon(config).await {
        Ok(()) => BlockyExitCode::CleanShutdown,
        Err(e) => {
            error!("Daemon error: {}", e);
            BlockyExitCode::RuntimeError
        }
    }
}

/// Pre-flight validation of the environment
///
/// The firewall tooling refuses non-root callers with confusing
/// errors, so check explicitly first.
async fn startup_checks(config: &BlockyConfig) -> Result<()> {
    if unsafe { libc::geteuid() } != 0 {
        anyhow::bail!("this program has to be run by root");
    }

    let probe = IpsetFirewall::new(FirewallSpec::blocking(
        &config.table,
        &config.chain,
        &config.ipset,
        config.rule_pos,
    ));
    probe
        .preflight()
        .await
        .context("firewall preflight failed")?;
    Ok(())
}

/// Run the daemon
async fn run_daemon(config: BlockyConfig) -> Result<()> {
    // Local whitelist: ACCEPT rule at rule_pos, so whitelisted traffic
    // is passed before the blocking rule below it is evaluated
    let whitelist_fw = IpsetFirewall::new(FirewallSpec::whitelist(
        &config.table,
        &config.chain,
        WHITELIST_SET_NAME,
        config.rule_pos,
    ));
    whitelist_fw.ensure_set().await?;
    whitelist_fw.ensure_rule().await?;
    let whitelist_members: BTreeSet<IpAddr> = config.whitelist_local_ips.iter().copied().collect();
    blocky_core::reconcile_set(&whitelist_fw, &whitelist_members).await?;

    let resolver: Box<dyn DomainResolver> = match HickoryResolver::from_system_conf() {
        Ok(resolver) => Box::new(resolver),
        Err(e) => {
            warn!("falling back to default resolver configuration: {}", e);
            Box::new(HickoryResolver::with_defaults(config.resolve_timeout()))
        }
    };

    // Blocking rule sits directly below the whitelist pass rule
    let firewall = Box::new(IpsetFirewall::new(FirewallSpec::blocking(
        &config.table,
        &config.chain,
        &config.ipset,
        config.rule_pos + 1,
    )));

    let engine_config = EngineConfig::from(&config);
    let (engine, mut event_rx) = BlockyEngine::new(
        resolver,
        firewall,
        config.domains.clone(),
        config.whitelist_local_ips.clone(),
        engine_config,
    )?;

    // Surface engine events for debugging without blocking the engine
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!(?event, "engine event");
        }
    });

    // Translate OS signals into engine shutdown
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received {}", signal),
            Err(e) => error!("Signal handling error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    let engine_result = engine.run_with_shutdown(Some(shutdown_rx)).await;

    // The engine took its own rule and set down; remove the whitelist
    // pieces regardless of how the engine ended
    if let Err(e) = whitelist_fw.delete_rule().await {
        warn!("failed to delete whitelist rule: {}", e);
    }
    if let Err(e) = whitelist_fw.destroy_set().await {
        warn!("failed to destroy whitelist set: {}", e);
    }

    engine_result?;
    info!("Shutdown.");
    Ok(())
}

/// Log the effective configuration at startup
fn log_startup_notice(path: &std::path::Path, config: &BlockyConfig) {
    info!("Config file: {}", path.display());
    info!(
        "Blocking {} domain(s) via set {} in {}/{} every {}s",
        config.domains.len(),
        config.ipset,
        config.table,
        config.chain,
        config.check_every
    );
    if !config.whitelist_local_ips.is_empty() {
        info!(
            "Whitelisted local addresses: {}",
            config
                .whitelist_local_ips
                .iter()
                .map(|ip| ip.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to set up SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to set up SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for CTRL-C")?;
    Ok("SIGINT")
}
