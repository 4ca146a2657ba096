//! Three-step setup flow: port, network name, network secret
//!
//! [`SetupWizard`] holds the flow and validation; the egui window in
//! `gui::setup` only renders it. Nothing touches disk until the last step
//! is accepted, so cancelling at any point keeps the previous settings.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::config::{Settings, SettingsStore};
use crate::constants::exit_code;
use crate::gui;
use crate::serial::PortInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    Port,
    NetworkName,
    NetworkSecret,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardProgress {
    Next(SetupStep),
    /// Settings were validated and saved
    Complete(Settings),
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("no serial ports are available")]
    NoPorts,

    #[error("serial port and Wi-Fi SSID are required")]
    MissingRequired,

    #[error("failed to save settings: {0:#}")]
    Save(anyhow::Error),
}

pub struct SetupWizard {
    store: SettingsStore,
    ports: Vec<PortInfo>,
    step: SetupStep,
    draft: Settings,
}

impl SetupWizard {
    /// Start from the stored settings; fails when no serial device is visible
    pub fn new(store: SettingsStore, ports: Vec<PortInfo>) -> Result<Self, SetupError> {
        if ports.is_empty() {
            return Err(SetupError::NoPorts);
        }

        let mut draft = store.load();
        if draft.port.is_empty() {
            draft.port = ports[0].name.clone();
        }

        Ok(Self {
            store,
            ports,
            step: SetupStep::Port,
            draft,
        })
    }

    pub fn step(&self) -> SetupStep {
        self.step
    }

    pub fn ports(&self) -> &[PortInfo] {
        &self.ports
    }

    pub fn network_name(&self) -> &str {
        &self.draft.network_name
    }

    /// Prefilled value for the current prompt
    pub fn initial_value(&self) -> &str {
        match self.step {
            SetupStep::Port => &self.draft.port,
            SetupStep::NetworkName => &self.draft.network_name,
            SetupStep::NetworkSecret => &self.draft.network_secret,
        }
    }

    /// Accept the answer to the current prompt
    ///
    /// Port and network name are trimmed; the secret is kept exactly as typed.
    pub fn submit(&mut self, value: &str) -> Result<WizardProgress, SetupError> {
        match self.step {
            SetupStep::Port => {
                self.draft.port = value.trim().to_string();
                self.step = SetupStep::NetworkName;
                Ok(WizardProgress::Next(self.step))
            }
            SetupStep::NetworkName => {
                self.draft.network_name = value.trim().to_string();
                self.step = SetupStep::NetworkSecret;
                Ok(WizardProgress::Next(self.step))
            }
            SetupStep::NetworkSecret => {
                self.draft.network_secret = value.to_string();
                self.finish()
            }
        }
    }

    fn finish(&self) -> Result<WizardProgress, SetupError> {
        if !self.draft.is_configured() {
            return Err(SetupError::MissingRequired);
        }
        self.store.save(&self.draft).map_err(SetupError::Save)?;
        info!(port = %self.draft.port, ssid = %self.draft.network_name, "Settings saved");
        Ok(WizardProgress::Complete(self.draft.clone()))
    }

    pub fn cancel(self) {
        info!(step = ?self.step, "Setup cancelled");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    Saved,
    Cancelled,
}

/// Runs the setup dialog to completion
pub trait SetupLauncher: Send + Sync {
    fn run(&self) -> Result<SetupOutcome>;
}

/// Runs `bongo-bridge setup` as a child process and waits for it
///
/// A fresh process per dialog lets the winit event loop be created again
/// each time the user picks Settings.
pub struct ProcessSetupLauncher {
    config_path: PathBuf,
}

impl ProcessSetupLauncher {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }
}

impl SetupLauncher for ProcessSetupLauncher {
    fn run(&self) -> Result<SetupOutcome> {
        let config = self.config_path.as_os_str();
        let mut child = gui::spawn_self([
            std::ffi::OsStr::new("setup"),
            std::ffi::OsStr::new("--config"),
            config,
        ])?;
        let status = child.wait().context("Failed to wait for setup dialog")?;
        info!(status = ?status.code(), "Setup dialog exited");

        Ok(match status.code() {
            Some(exit_code::SETUP_SAVED) => SetupOutcome::Saved,
            _ => SetupOutcome::Cancelled,
        })
    }
}
