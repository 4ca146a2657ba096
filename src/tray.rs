//! System tray via D-Bus StatusNotifierItem (ksni)
//!
//! The tray runs on its own thread with a current-thread Tokio runtime.
//! Menu clicks are handed to an injected callback; the link state shown in
//! the tooltip follows a `watch` channel fed by the controller.

use anyhow::{anyhow, Context, Result};
use ksni::TrayMethods;
use std::io::Cursor;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use tokio::sync::{oneshot, watch};
use tracing::{error, info, warn};

use crate::constants::tray as consts;
use crate::controller::LinkState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayAction {
    Settings,
    ResendWifi,
    TestConnection,
    Exit,
}

impl TrayAction {
    pub fn label(&self) -> &'static str {
        match self {
            TrayAction::Settings => "Settings",
            TrayAction::ResendWifi => "Resend Wi-Fi",
            TrayAction::TestConnection => "Test Connection",
            TrayAction::Exit => "Exit",
        }
    }

    fn icon_name(&self) -> &'static str {
        match self {
            TrayAction::Settings => "preferences-system",
            TrayAction::ResendWifi => "network-wireless",
            TrayAction::TestConnection => "network-transmit",
            TrayAction::Exit => "application-exit",
        }
    }
}

/// Invoked on the tray thread; must not block
pub type ActionCallback = Arc<dyn Fn(TrayAction) + Send + Sync>;

pub trait TrayAdapter {
    fn start(&mut self, on_action: ActionCallback) -> Result<()>;
    fn stop(&mut self);
}

struct BridgeTray {
    on_action: ActionCallback,
    state: LinkState,
    icon: Vec<ksni::Icon>,
}

impl BridgeTray {
    fn item(action: TrayAction) -> ksni::MenuItem<Self> {
        ksni::menu::StandardItem {
            label: action.label().to_string(),
            icon_name: action.icon_name().to_string(),
            activate: Box::new(move |tray: &mut Self| (tray.on_action)(action)),
            ..Default::default()
        }
        .into()
    }
}

impl ksni::Tray for BridgeTray {
    fn id(&self) -> String {
        consts::ID.to_string()
    }

    fn title(&self) -> String {
        consts::TITLE.to_string()
    }

    fn icon_pixmap(&self) -> Vec<ksni::Icon> {
        self.icon.clone()
    }

    fn tool_tip(&self) -> ksni::ToolTip {
        ksni::ToolTip {
            title: consts::TITLE.to_string(),
            description: self.state.label().to_string(),
            ..Default::default()
        }
    }

    fn status(&self) -> ksni::Status {
        match self.state {
            LinkState::Disconnected => ksni::Status::NeedsAttention,
            _ => ksni::Status::Active,
        }
    }

    fn menu(&self) -> Vec<ksni::MenuItem<Self>> {
        vec![
            Self::item(TrayAction::Settings),
            Self::item(TrayAction::ResendWifi),
            Self::item(TrayAction::TestConnection),
            ksni::MenuItem::Separator,
            Self::item(TrayAction::Exit),
        ]
    }
}

/// ksni tray whose tooltip tracks the controller's [`LinkState`]
pub struct StatusTray {
    state: watch::Receiver<LinkState>,
    stop_tx: Option<oneshot::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl StatusTray {
    pub fn new(state: watch::Receiver<LinkState>) -> Self {
        Self {
            state,
            stop_tx: None,
            thread: None,
        }
    }
}

impl TrayAdapter for StatusTray {
    fn start(&mut self, on_action: ActionCallback) -> Result<()> {
        if self.thread.is_some() {
            return Err(anyhow!("Tray is already running"));
        }

        let tray = BridgeTray {
            on_action,
            state: *self.state.borrow(),
            icon: load_tray_icon(),
        };
        let mut state = self.state.clone();
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

        let handle = thread::Builder::new()
            .name("tray".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(anyhow!(e).context("Failed to build tray runtime")));
                        return;
                    }
                };

                runtime.block_on(async move {
                    let handle = match tray.spawn().await {
                        Ok(handle) => handle,
                        Err(e) => {
                            let _ = ready_tx.send(Err(anyhow!(e).context("Failed to register tray icon")));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(()));

                    loop {
                        tokio::select! {
                            changed = state.changed() => {
                                if changed.is_err() {
                                    break;
                                }
                                let current = *state.borrow_and_update();
                                handle.update(move |tray: &mut BridgeTray| tray.state = current).await;
                            }
                            _ = &mut stop_rx => break,
                        }
                    }

                    handle.shutdown().await;
                });
            })
            .context("Failed to spawn tray thread")?;

        ready_rx
            .recv()
            .context("Tray thread exited before reporting status")??;

        self.stop_tx = Some(stop_tx);
        self.thread = Some(handle);
        info!("Tray icon created");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("Tray thread panicked");
            }
        }
    }
}

/// Convert RGBA rows to the ARGB32 (network order) pixmap ksni expects
fn rgba_to_argb(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4)
        .flat_map(|px| [px[3], px[0], px[1], px[2]])
        .collect()
}

fn decode_png_icon(bytes: &[u8]) -> Result<ksni::Icon> {
    let decoder = png::Decoder::new(Cursor::new(bytes));
    let mut reader = decoder.read_info()?;
    let size = reader
        .output_buffer_size()
        .context("Tray icon dimensions overflow")?;
    let mut buf = vec![0; size];
    let info = reader.next_frame(&mut buf)?;
    let pixels = &buf[..info.buffer_size()];

    let rgba = match info.color_type {
        png::ColorType::Rgba => pixels.to_vec(),
        png::ColorType::Rgb => pixels
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 0xFF])
            .collect(),
        other => {
            return Err(anyhow!(
                "Unsupported tray icon color type {:?} (expected RGB or RGBA)",
                other
            ));
        }
    };

    Ok(ksni::Icon {
        width: i32::try_from(info.width)?,
        height: i32::try_from(info.height)?,
        data: rgba_to_argb(&rgba),
    })
}

fn fallback_icon() -> ksni::Icon {
    let side = consts::FALLBACK_ICON_SIZE;
    let pixels = (side * side) as usize;
    ksni::Icon {
        width: side,
        height: side,
        data: consts::FALLBACK_ICON_ARGB.repeat(pixels),
    }
}

fn load_tray_icon() -> Vec<ksni::Icon> {
    let icon = decode_png_icon(include_bytes!("../assets/tray-icon.png")).unwrap_or_else(|e| {
        error!(error = ?e, "Failed to decode tray icon, using plain fallback");
        fallback_icon()
    });
    vec![icon]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba_to_argb_reorders_channels() {
        assert_eq!(rgba_to_argb(&[1, 2, 3, 4, 5, 6, 7, 8]), vec![4, 1, 2, 3, 8, 5, 6, 7]);
    }

    #[test]
    fn test_bundled_icon_decodes() {
        let icon = decode_png_icon(include_bytes!("../assets/tray-icon.png")).unwrap();
        assert_eq!(icon.data.len(), (icon.width * icon.height * 4) as usize);
    }

    #[test]
    fn test_fallback_icon_is_square_and_opaque() {
        let icon = fallback_icon();
        assert_eq!(icon.width, icon.height);
        assert!(icon.data.chunks_exact(4).all(|px| px[0] == 0xFF));
    }

    #[test]
    fn test_menu_lists_all_actions_with_exit_last() {
        let tray = BridgeTray {
            on_action: Arc::new(|_| {}),
            state: LinkState::Idle,
            icon: Vec::new(),
        };
        let labels: Vec<String> = ksni::Tray::menu(&tray)
            .into_iter()
            .filter_map(|item| match item {
                ksni::MenuItem::Standard(item) => Some(item.label),
                _ => None,
            })
            .collect();
        assert_eq!(labels, vec!["Settings", "Resend Wi-Fi", "Test Connection", "Exit"]);
    }

    #[test]
    fn test_menu_activation_reports_action() {
        let (tx, rx) = mpsc::channel();
        let tx = std::sync::Mutex::new(tx);
        let mut tray = BridgeTray {
            on_action: Arc::new(move |action| tx.lock().unwrap().send(action).unwrap()),
            state: LinkState::Idle,
            icon: Vec::new(),
        };

        for item in ksni::Tray::menu(&tray) {
            if let ksni::MenuItem::Standard(item) = item {
                (item.activate)(&mut tray);
            }
        }

        let seen: Vec<TrayAction> = rx.try_iter().collect();
        assert_eq!(
            seen,
            vec![
                TrayAction::Settings,
                TrayAction::ResendWifi,
                TrayAction::TestConnection,
                TrayAction::Exit
            ]
        );
    }
}
