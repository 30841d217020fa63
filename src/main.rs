//! bt-autolock - idle and Bluetooth proximity based session autolocker.

use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use bt_autolock::autolock::Autolocker;
use bt_autolock::config::Config;
use bt_autolock::config::Settings;
use bt_autolock::domain::DeviceAddress;
use bt_autolock::idle::IdlePolicy;
use bt_autolock::idle::X11IdleProbe;
use bt_autolock::lock::CommandLocker;
use bt_autolock::notify::DesktopNotifier;
use bt_autolock::proximity::BluezDevice;
use bt_autolock::proximity::ProximityError;
use clap::Parser;
use thiserror::Error;
use tokio::signal::unix::SignalKind;
use tokio::signal::unix::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;
use zbus::Connection;

/// Lock the session after a period of inactivity.
///
/// When a companion Bluetooth device is given, locking waits for it to
/// disconnect instead of warning first.
#[derive(Parser, Debug)]
#[command(name = "bt-autolock")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Idle time in seconds before invoking the lock command [default: 30].
    #[arg(long = "idletime")]
    idle_time: Option<u64>,

    /// Command to invoke to lock [default: i3lock].
    #[arg(long = "lockapp")]
    lock_app: Option<String>,

    /// MAC address of the companion device whose connection is checked.
    #[arg(long = "macaddr")]
    mac_address: Option<String>,

    /// Bluetooth adapter the companion is paired on [default: hci0].
    #[arg(long)]
    adapter: Option<String>,

    /// How idle time is computed [default: threshold].
    #[arg(long, value_enum)]
    idle_policy: Option<IdlePolicy>,

    /// Log the lock command instead of running it.
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Override config file values with the flags that were given.
    fn apply(&self, config: &mut Config) {
        if let Some(idle_time) = self.idle_time {
            config.idle_time_seconds = idle_time;
        }
        if let Some(ref lock_app) = self.lock_app {
            config.lock_command.clone_from(lock_app);
        }
        if self.mac_address.is_some() {
            config.mac_address.clone_from(&self.mac_address);
        }
        if let Some(ref adapter) = self.adapter {
            config.adapter.clone_from(adapter);
        }
        if let Some(policy) = self.idle_policy {
            config.idle_policy = policy;
        }
        if self.dry_run {
            config.dry_run = true;
        }
    }
}

/// Fatal startup conditions with operator-facing messages.
#[derive(Error, Debug)]
enum StartupError {
    #[error("Device {address} is not known, please pair it first")]
    UnknownDevice {
        address: DeviceAddress,
        #[source]
        source: ProximityError,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("bt-autolock v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config =
        Config::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);

    let settings = Settings::from_config(&config).context("Invalid configuration")?;
    info!(
        "Configuration loaded (idle={:?}, policy={:?}, companion={}, dry_run={})",
        settings.max_idle,
        settings.idle_policy,
        settings
            .companion
            .as_ref()
            .map_or_else(|| "none".to_string(), ToString::to_string),
        settings.dry_run
    );

    run(&settings).await
}

/// Initialize logging with the specified level.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(format!("bt_autolock={level}"))
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}

/// Connect every component and run the decision loop until a shutdown signal.
async fn run(settings: &Settings) -> Result<()> {
    let idle = X11IdleProbe::connect().context("Failed to connect to X display")?;

    let system_bus = Connection::system()
        .await
        .context("Failed to connect to system bus")?;
    let session_bus = Connection::session()
        .await
        .context("Failed to connect to session bus")?;

    let companion = match settings.companion {
        Some(ref address) => Some(
            BluezDevice::new(&system_bus, address, &settings.adapter)
                .await
                .map_err(|source| StartupError::UnknownDevice {
                    address: address.clone(),
                    source,
                })?,
        ),
        None => None,
    };

    let notifier = DesktopNotifier::new(&session_bus)
        .await
        .context("Failed to create notification proxy")?;
    let locker = CommandLocker::new(settings.lock_command.clone(), settings.dry_run);
    info!("Lock command: {}", locker.display());

    let autolocker = Autolocker::new(idle, companion, notifier, locker, settings);

    tokio::select! {
        () = autolocker.run() => Ok(()),
        result = shutdown_signal() => {
            result?;
            info!("bt-autolock stopped");
            Ok(())
        }
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for SIGINT")?;
            info!("Received SIGINT");
        }
    }

    Ok(())
}
