//! Application controller
//!
//! Sequences startup and carries out tray actions against the shared
//! serial session. Every operation here may block on device timing, so the
//! tray and key hook call in from their own threads.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::{Settings, SettingsStore};
use crate::notify::{Notifier, Severity};
use crate::protocol::{DeviceSender, SendError};
use crate::serial::{pause, SerialSession};
use crate::setup::{SetupLauncher, SetupOutcome};
use crate::tray::TrayAction;

/// Coarse connection state shown in the tray tooltip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Unconfigured,
    Configuring,
    Connected,
    Disconnected,
    Reconnecting,
    Sending,
    Idle,
    Terminated,
}

impl LinkState {
    pub fn label(&self) -> &'static str {
        match self {
            LinkState::Unconfigured => "Not configured",
            LinkState::Configuring => "Configuring...",
            LinkState::Connected => "Connected",
            LinkState::Disconnected => "Disconnected",
            LinkState::Reconnecting => "Reconnecting...",
            LinkState::Sending => "Sending...",
            LinkState::Idle => "Idle",
            LinkState::Terminated => "Exiting",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectStage {
    Open,
    Credentials,
}

impl std::fmt::Display for ReconnectStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconnectStage::Open => f.write_str("opening the serial port"),
            ReconnectStage::Credentials => f.write_str("sending Wi-Fi credentials"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("reconnect failed while {stage}: {source}")]
pub struct ReconnectError {
    pub stage: ReconnectStage,
    #[source]
    pub source: SendError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    /// Port open; tray and key hook should start
    Ready,
    /// User cancelled the initial setup
    Cancelled,
    /// Could not open the port
    Failed,
}

pub struct Controller {
    store: SettingsStore,
    settings: Mutex<Settings>,
    session: Arc<SerialSession>,
    sender: DeviceSender,
    setup: Arc<dyn SetupLauncher>,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<LinkState>,
}

impl Controller {
    pub fn new(
        store: SettingsStore,
        session: Arc<SerialSession>,
        setup: Arc<dyn SetupLauncher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let settings = store.load();
        let initial = if settings.is_configured() {
            LinkState::Disconnected
        } else {
            LinkState::Unconfigured
        };
        let (state, _) = watch::channel(initial);

        Self {
            store,
            settings: Mutex::new(settings),
            sender: DeviceSender::new(Arc::clone(&session)),
            session,
            setup,
            notifier,
            state,
        }
    }

    pub fn settings(&self) -> Settings {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Receive every [`LinkState`] change
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: LinkState) {
        debug!(state = ?state, "Link state");
        self.state.send_replace(state);
    }

    fn reload_settings(&self) -> Settings {
        let settings = self.store.load();
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings.clone();
        settings
    }

    /// Run the setup dialog, returning whether new settings were saved
    fn configure(&self) -> bool {
        let previous = self.state();
        self.set_state(LinkState::Configuring);

        match self.setup.run() {
            Ok(SetupOutcome::Saved) => {
                let settings = self.reload_settings();
                info!(port = %settings.port, ssid = %settings.network_name, "Setup completed");
                true
            }
            Ok(SetupOutcome::Cancelled) => {
                info!("Setup cancelled");
                self.set_state(previous);
                false
            }
            Err(e) => {
                error!(error = ?e, "Failed to run setup dialog");
                self.notifier
                    .notify(Severity::Error, "Settings", &format!("Could not open the settings dialog: {e:#}"));
                self.set_state(previous);
                false
            }
        }
    }

    fn open_port(&self) -> Result<(), SendError> {
        let port = self.settings().port;
        match self.session.open(&port) {
            Ok(()) => {
                self.set_state(LinkState::Connected);
                Ok(())
            }
            Err(e) => {
                self.set_state(LinkState::Disconnected);
                Err(e.into())
            }
        }
    }

    fn send_credentials(&self) -> Result<(), SendError> {
        self.set_state(LinkState::Sending);
        let result = self.sender.send_wifi(&self.settings());
        self.set_state(if self.session.is_open() {
            LinkState::Idle
        } else {
            LinkState::Disconnected
        });
        result
    }

    /// Initial setup, open, and first credential push
    pub fn startup(&self) -> Startup {
        if !self.settings().is_configured() {
            info!("Initial setup required");
            if !self.configure() || !self.settings().is_configured() {
                info!("Initial setup cancelled, exiting");
                self.set_state(LinkState::Terminated);
                return Startup::Cancelled;
            }
        }

        info!("Connecting to device");
        if let Err(e) = self.open_port() {
            self.notifier.notify(
                Severity::Error,
                "Error",
                &format!("Failed to open serial port {}: {e}", self.settings().port),
            );
            self.set_state(LinkState::Terminated);
            return Startup::Failed;
        }

        pause(self.session.timings().device_ready);
        if let Err(e) = self.send_credentials() {
            warn!(error = %e, "Initial Wi-Fi send failed");
            self.notifier.notify(
                Severity::Warning,
                "Warning",
                "Wi-Fi setup send failed. Retry later from the tray menu.",
            );
        }

        Startup::Ready
    }

    /// close, settle, open, settle, send credentials
    ///
    /// Credentials are only sent once the open succeeded.
    pub fn reconnect(&self) -> Result<(), ReconnectError> {
        info!("Reconnecting serial port");
        self.set_state(LinkState::Reconnecting);
        let timings = self.session.timings();

        self.session.close();
        pause(timings.reconnect_settle);

        self.open_port().map_err(|source| ReconnectError {
            stage: ReconnectStage::Open,
            source,
        })?;

        pause(timings.device_ready);
        self.send_credentials().map_err(|source| ReconnectError {
            stage: ReconnectStage::Credentials,
            source,
        })
    }

    /// Settings menu item
    pub fn open_settings(&self) {
        if !self.configure() {
            return;
        }

        match self.reconnect() {
            Ok(()) => self.notifier.notify(
                Severity::Info,
                "Success",
                "Serial connection and Wi-Fi setup are complete.",
            ),
            Err(ReconnectError { stage: ReconnectStage::Open, source }) => {
                error!(error = %source, "Reconnect failed at open");
                self.notifier.notify(
                    Severity::Error,
                    "Error",
                    &format!("Failed to open serial port {}: {source}", self.settings().port),
                );
            }
            Err(ReconnectError { stage: ReconnectStage::Credentials, source }) => {
                warn!(error = %source, "Reconnect failed at credential send");
                self.notifier.notify(
                    Severity::Warning,
                    "Warning",
                    "Serial connection succeeded but sending the Wi-Fi settings failed.",
                );
            }
        }
    }

    /// Resend Wi-Fi menu item
    pub fn resend_wifi(&self) {
        match self.send_credentials() {
            Ok(()) => self
                .notifier
                .notify(Severity::Info, "Wi-Fi Settings", "Wi-Fi settings were sent to the device."),
            Err(e) => {
                warn!(error = %e, "Wi-Fi resend failed");
                self.notifier.notify(
                    Severity::Error,
                    "Wi-Fi Settings",
                    &format!("Sending the Wi-Fi settings failed: {e}"),
                );
            }
        }
    }

    /// Test Connection menu item
    ///
    /// Success only means the probe was written; the firmware never answers.
    pub fn test_connection(&self) {
        self.set_state(LinkState::Sending);
        let result = self.sender.send_test();
        self.set_state(if self.session.is_open() {
            LinkState::Idle
        } else {
            LinkState::Disconnected
        });

        match result {
            Ok(()) => self.notifier.notify(
                Severity::Info,
                "Connection Test",
                "Test command was written to the device.",
            ),
            Err(e) => {
                warn!(error = %e, "Connection test failed");
                self.notifier.notify(
                    Severity::Error,
                    "Connection Test",
                    &format!("There is a problem with the device connection: {e}"),
                );
            }
        }
    }

    /// Per-keystroke pulse; failures stay in the debug log
    pub fn send_key(&self) {
        if let Err(e) = self.sender.send_key() {
            debug!(error = %e, "Key pulse dropped");
        }
    }

    /// Release the serial handle; safe to call more than once
    pub fn exit(&self) {
        if self.state() != LinkState::Terminated {
            info!("Shutting down");
        }
        self.session.close();
        self.set_state(LinkState::Terminated);
    }

    /// Dispatch a tray action other than exit
    pub fn handle(&self, action: TrayAction) {
        info!(action = ?action, "Tray action");
        match action {
            TrayAction::Settings => self.open_settings(),
            TrayAction::ResendWifi => self.resend_wifi(),
            TrayAction::TestConnection => self.test_connection(),
            TrayAction::Exit => self.exit(),
        }
    }
}
