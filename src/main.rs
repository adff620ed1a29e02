use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::info;

use erasure_core::config::EngineConfig;
use erasure_core::coordinator::RequestCoordinator;
use erasure_core::engine::WipeEngine;
use erasure_core::error::Result;
use erasure_core::inventory::InventoryService;
use erasure_core::platform::ProbeTimeouts;
use erasure_core::ports::PlatformProbePort;
use erasure_core::registry::ActiveWipeRegistry;
use erasure_core::report;
use erasure_core::testing::FakePersistence;

/// Demonstration CLI for the disk-erasure core: lists devices, starts a
/// wipe, and prints status/report. A real deployment wires a durable
/// `PersistencePort` in place of the in-memory one used here; the engine,
/// guard, and coordinator are unaffected by which one is plugged in.
#[derive(Parser)]
#[command(name = "erasure-cli")]
#[command(about = "Supervised disk-erasure CLI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan and list attached storage devices
    List,
    /// Start a wipe on a device
    Wipe {
        /// Device id as reported by `list` (not the raw device path)
        #[arg(long)]
        device_id: String,
        /// zeros | random | dod | bsi | fast_clear
        #[arg(long, default_value = "zeros")]
        method: String,
        #[arg(long, default_value_t = 1)]
        passes: u32,
    },
    /// Print the status and report for a wipe log
    Status {
        #[arg(long)]
        log_id: String,
    },
}

fn build_probe(timeouts: ProbeTimeouts) -> Arc<dyn PlatformProbePort> {
    #[cfg(target_os = "linux")]
    {
        Arc::new(erasure_core::platform::linux::LinuxProbe::new(timeouts))
    }
    #[cfg(target_os = "windows")]
    {
        Arc::new(erasure_core::platform::windows::WindowsProbe::new(timeouts))
    }
    #[cfg(target_os = "macos")]
    {
        Arc::new(erasure_core::platform::macos::MacosProbe::new(timeouts))
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        let _ = timeouts;
        Arc::new(erasure_core::platform::unsupported::UnsupportedProbe)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    if cli.verbose {
        info!("verbose logging enabled");
    }

    let persistence = Arc::new(FakePersistence::new());
    let config = EngineConfig::from_env();
    let probe = build_probe(config.probe_timeouts());
    let registry = ActiveWipeRegistry::new();

    if config.dry_run {
        println!("(dry-run: set ERASURE_DRY_RUN=0 to perform real destructive writes)");
    }

    match cli.command {
        Commands::List => {
            let inventory = InventoryService::new(persistence.clone(), probe.clone());
            let devices = inventory.scan().await?;
            if devices.is_empty() {
                println!("No storage devices found.");
            }
            for device in devices {
                println!(
                    "{}  {}  {} ({}){}",
                    device.id,
                    device.device_path,
                    device.model,
                    device.size_human,
                    if device.is_boot_disk { "  [BOOT DISK]" } else { "" }
                );
            }
        }
        Commands::Wipe {
            device_id,
            method,
            passes,
        } => {
            let engine = WipeEngine::new(persistence.clone(), probe.clone(), registry, config);
            let coordinator = RequestCoordinator::new(&engine);
            match coordinator.start_wipe(&device_id, &method, passes).await {
                Ok(outcome) => println!("started wipe, log id: {}", outcome.wipe_log_id),
                Err(e) => eprintln!("refused ({:?}): {}", e.class, e.message),
            }
        }
        Commands::Status { log_id } => {
            let engine = WipeEngine::new(persistence.clone(), probe.clone(), registry, config);
            let coordinator = RequestCoordinator::new(&engine);
            match coordinator.wipe_status(&log_id).await {
                Ok(Some(log)) => {
                    let report = report::build_report(&log);
                    println!("{}", report::render_text(&report));
                }
                Ok(None) => println!("no such wipe log: {log_id}"),
                Err(e) => eprintln!("error ({:?}): {}", e.class, e.message),
            }
        }
    }

    Ok(())
}
