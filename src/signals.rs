use anyhow::{Context, Result};
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::sync::mpsc::Sender;
use std::thread;
use tracing::info;

/// Why the main loop should stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// Exit picked from the tray menu
    TrayExit,
    /// SIGINT, SIGTERM or SIGHUP
    Signal(i32),
}

/// Forward the first termination signal to `shutdown`
pub fn install(shutdown: Sender<Shutdown>) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP]).context("Failed to register signal handlers")?;

    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(signal, "Received termination signal");
                let _ = shutdown.send(Shutdown::Signal(signal));
            }
        })
        .context("Failed to spawn signal thread")?;

    Ok(())
}
