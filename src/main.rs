//! procond daemon
//!
//! Watches `/sys/class/hidraw` for Nintendo controllers and drives each one
//! found: protocol setup, input translation to a virtual gamepad and Home
//! button gestures.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};

use clap::Parser;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use procond::{
    config::Config,
    connection::{Connection, ConnectionSettings},
    registry::{new_shared_registry, SharedRegistry, SLOT_COUNT},
    sink::UinputSink,
    transport::{find_devices, DeviceInfo, HidrawTransport, TransportError, MAX_REPORT_LEN},
};

/// Sleep between reads when no report is pending
const REPORT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Why a device task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceExit {
    /// Removed, failed or stopped for shutdown
    Closed,
    /// Turned away because every slot was taken
    Rejected,
}

/// procond - Nintendo Switch Pro Controller driver
#[derive(Parser, Debug)]
#[command(name = "procond")]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/procond/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// List connected controllers and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.list_devices {
        list_devices();
        return Ok(());
    }

    info!("procond starting...");

    let loaded = match &args.config {
        Some(path) => Config::load(path),
        None => Config::load_default(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }
    };

    let registry = new_shared_registry();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut discovery = tokio::spawn(run_discovery_loop(
        config.poll_interval(),
        config.connection_settings(),
        registry,
        shutdown_rx,
    ));

    info!("procond ready");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received, exiting...");
        }
        result = &mut discovery => {
            if let Err(e) = result {
                error!("Discovery task panicked: {:?}", e);
            }
            return Ok(());
        }
    }

    // Device tasks release their slots before the discovery task returns
    let _ = shutdown_tx.send(true);
    if let Err(e) = discovery.await {
        error!("Discovery task panicked: {:?}", e);
    }

    Ok(())
}

/// Print detected controllers
fn list_devices() {
    println!("Scanning for Nintendo controllers...\n");

    let devices = find_devices().unwrap_or_default();
    if devices.is_empty() {
        println!("No controllers found.");
        println!("\nTroubleshooting:");
        println!("  - Ensure the controller is paired or plugged in");
        println!("  - Check that udev rules grant access to /dev/hidraw*");
        println!("  - Verify the uinput module is loaded");
        return;
    }

    println!("Found {} controller(s):\n", devices.len());
    for (i, device) in devices.iter().enumerate() {
        println!("{}. {} [{}]", i + 1, device.name, device.product_name());
        println!("   Path:    {:?}", device.path);
        println!("   Product: 0x{:04X}", device.product_id);
        println!("   Link:    {}", device.framing);
        println!();
    }
}

/// Rescan for controllers and start one device task per new hidraw node
///
/// Returns once shutdown is signalled and every device task has finished.
async fn run_discovery_loop(
    poll_interval: Duration,
    settings: ConnectionSettings,
    registry: SharedRegistry,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut active: HashMap<PathBuf, JoinHandle<DeviceExit>> = HashMap::new();
    let mut rejected: HashSet<PathBuf> = HashSet::new();
    let mut next_id = 0u64;

    loop {
        let finished: Vec<PathBuf> = active
            .iter()
            .filter(|(_, task)| task.is_finished())
            .map(|(path, _)| path.clone())
            .collect();
        for path in finished {
            let Some(task) = active.remove(&path) else {
                continue;
            };
            match task.await {
                Ok(DeviceExit::Rejected) => {
                    info!(path = %path.display(), "Controller waits for a free slot");
                    rejected.insert(path);
                }
                Ok(DeviceExit::Closed) => {}
                Err(e) => error!(path = %path.display(), "Device task panicked: {:?}", e),
            }
        }

        match find_devices() {
            Ok(devices) => {
                rejected.retain(|path| devices.iter().any(|device| &device.path == path));
                for device in devices {
                    if active.contains_key(&device.path) || !should_retry(&rejected, &device.path, &registry) {
                        continue;
                    }
                    rejected.remove(&device.path);
                    next_id += 1;
                    let path = device.path.clone();
                    let task = tokio::spawn(run_device(
                        next_id,
                        device,
                        settings,
                        registry.clone(),
                        shutdown.clone(),
                    ));
                    active.insert(path, task);
                }
            }
            Err(TransportError::DeviceNotFound) => {
                debug!("No hidraw class directory, polling every {:?}", poll_interval);
            }
            Err(e) => {
                error!("Error during hidraw scan: {}", e);
            }
        }

        tokio::select! {
            _ = sleep(poll_interval) => {}
            _ = shutdown.changed() => break,
        }
    }

    for (path, task) in active {
        if let Err(e) = task.await {
            error!(path = %path.display(), "Device task panicked: {:?}", e);
        }
    }
}

/// A rejected controller is only retried once a slot is free
fn should_retry(rejected: &HashSet<PathBuf>, path: &Path, registry: &SharedRegistry) -> bool {
    if !rejected.contains(path) {
        return true;
    }
    registry.lock().unwrap_or_else(PoisonError::into_inner).len() < SLOT_COUNT
}

/// Drive one controller until it disconnects, is rejected or shutdown starts
async fn run_device(
    id: u64,
    device: DeviceInfo,
    settings: ConnectionSettings,
    registry: SharedRegistry,
    shutdown: watch::Receiver<bool>,
) -> DeviceExit {
    info!(
        path = %device.path.display(),
        name = %device.name,
        framing = %device.framing,
        "Controller detected"
    );

    let transport = match HidrawTransport::open(&device.path) {
        Ok(transport) => Arc::new(transport),
        Err(e) => {
            warn!(path = %device.path.display(), "Cannot open controller: {}", e);
            return DeviceExit::Closed;
        }
    };

    let mut connection = match Connection::new(
        id,
        device.framing,
        transport.clone(),
        Box::new(UinputSink::new(device.product_id)),
        registry,
        settings,
    ) {
        Ok(connection) => connection,
        Err(e) => {
            error!(path = %device.path.display(), "Controller setup failed: {}", e);
            return DeviceExit::Closed;
        }
    };

    let mut buf = [0u8; MAX_REPORT_LEN];
    loop {
        if connection.is_rejected() || *shutdown.borrow() {
            break;
        }

        connection.poll_force_feedback();

        match transport.read_report(&mut buf) {
            Ok(Some(len)) => {
                connection.handle_report(&buf[..len]);
                tokio::task::yield_now().await;
            }
            Ok(None) => sleep(REPORT_POLL_INTERVAL).await,
            Err(TransportError::Disconnected) => {
                info!(path = %device.path.display(), "Controller removed");
                break;
            }
            Err(e) => {
                error!(path = %device.path.display(), "Error reading controller: {}", e);
                break;
            }
        }
    }

    let exit = if connection.is_rejected() {
        DeviceExit::Rejected
    } else {
        DeviceExit::Closed
    };
    connection.shutdown().await;
    exit
}
