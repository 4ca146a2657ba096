#![forbid(unsafe_code)]

mod config;
mod constants;
mod controller;
mod gui;
mod key_hook;
mod notify;
mod protocol;
mod serial;
mod setup;
#[cfg(unix)]
mod signals;
mod tray;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use tracing::{error, info, warn, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use config::SettingsStore;
use constants::{exit_code, permissions};
use controller::{Controller, Startup};
use key_hook::{EvdevHook, InputHook};
use notify::{Severity, WindowNotifier};
use serial::{list_ports, SerialPortConnector, SerialSession, Timings};
use setup::ProcessSetupLauncher;
#[cfg(unix)]
use signals::Shutdown;
use tray::{StatusTray, TrayAction, TrayAdapter};

#[cfg(not(unix))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
    TrayExit,
}

#[derive(Debug, Parser)]
#[command(name = "bongo-bridge", version, about = "Forward key presses to a BongoCat display over serial")]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the setup dialog and save the result
    Setup,
    /// Show a message window
    Notice {
        #[arg(long, value_enum, default_value_t = Severity::Info)]
        level: Severity,
        #[arg(long)]
        title: String,
        #[arg(long)]
        message: String,
    },
    /// List visible serial ports
    Ports,
}

fn init_logging() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn print_ports() -> Result<()> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
        println!("(membership in the '{}' group may be required)", permissions::SERIAL_GROUP);
    }
    for port in ports {
        println!("{}", port.display_label());
    }
    Ok(())
}

fn run_bridge(store: SettingsStore) -> Result<()> {
    info!("BongoCat Controller starting");

    let session = Arc::new(SerialSession::new(Box::new(SerialPortConnector), Timings::default()));
    let controller = Arc::new(Controller::new(
        store.clone(),
        session,
        Arc::new(ProcessSetupLauncher::new(store.path().to_path_buf())),
        Arc::new(WindowNotifier),
    ));

    match controller.startup() {
        Startup::Ready => {}
        Startup::Cancelled | Startup::Failed => return Ok(()),
    }

    // Key monitoring is optional - the tray still works without it
    let mut hook = EvdevHook::new();
    let key_controller = Arc::clone(&controller);
    match hook.start(Arc::new(move || key_controller.send_key())) {
        Ok(()) => info!("Keyboard monitoring started"),
        Err(e) => key_hook::print_permission_error(&e),
    }

    let (shutdown_tx, shutdown_rx) = mpsc::channel();

    #[cfg(unix)]
    if let Err(e) = signals::install(shutdown_tx.clone()) {
        warn!(error = ?e, "Signal handling unavailable");
    }

    let tray_controller = Arc::clone(&controller);
    let on_action = Arc::new(move |action: TrayAction| {
        let controller = Arc::clone(&tray_controller);
        let shutdown_tx = shutdown_tx.clone();
        // Never block the tray's event loop on serial timing or dialogs
        thread::spawn(move || {
            if action == TrayAction::Exit {
                controller.exit();
                let _ = shutdown_tx.send(Shutdown::TrayExit);
            } else {
                controller.handle(action);
            }
        });
    });

    let mut tray = StatusTray::new(controller.subscribe());
    if let Err(e) = tray.start(on_action) {
        error!(error = ?e, "Failed to start tray icon, running until signalled");
    }

    info!("Initialization complete, running in the system tray");

    let reason = shutdown_rx.recv();
    info!(reason = ?reason, "Stopping");

    controller.exit();
    hook.stop();
    tray.stop();

    info!("BongoCat Controller exited");
    Ok(())
}

fn main() -> Result<()> {
    init_logging()?;

    let cli = Cli::parse();
    let store = cli
        .config
        .map(SettingsStore::new)
        .unwrap_or_else(SettingsStore::at_default_path);

    match cli.command {
        None => run_bridge(store),
        Some(Command::Setup) => {
            let saved = gui::run_setup_dialog(store)?;
            std::process::exit(if saved {
                exit_code::SETUP_SAVED
            } else {
                exit_code::SETUP_CANCELLED
            });
        }
        Some(Command::Notice { level, title, message }) => gui::run_notice(level, &title, &message),
        Some(Command::Ports) => print_ports(),
    }
}
