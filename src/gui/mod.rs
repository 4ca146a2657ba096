//! egui windows run as short-lived child processes
//!
//! The tray process never owns a winit event loop. Each dialog is a fresh
//! `bongo-bridge <subcommand>` process so it can be shown any number of times.

pub mod constants;
pub mod notice;
pub mod setup;

use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::process::{Child, Command};

pub use notice::run_notice;
pub use setup::run_setup_dialog;

/// Spawn this executable with `args`
pub fn spawn_self<I, S>(args: I) -> Result<Child>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let exe_path = std::env::current_exe().context("Failed to resolve executable path")?;
    Command::new(exe_path)
        .args(args)
        .spawn()
        .context("Failed to spawn dialog process")
}
