//! Setup dialog window driving [`SetupWizard`]

use std::cell::Cell;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use eframe::{egui, NativeOptions};
use tracing::{error, info};

use super::constants::*;
use crate::config::SettingsStore;
use crate::serial::list_ports;
use crate::setup::{SetupError, SetupStep, SetupWizard, WizardProgress};

struct SetupApp {
    wizard: Option<SetupWizard>,
    input: String,
    error: Option<String>,
    saved: Rc<Cell<bool>>,
}

impl SetupApp {
    fn new(wizard: Result<SetupWizard, SetupError>, saved: Rc<Cell<bool>>) -> Self {
        match wizard {
            Ok(wizard) => Self {
                input: wizard.initial_value().to_string(),
                wizard: Some(wizard),
                error: None,
                saved,
            },
            Err(e) => Self {
                wizard: None,
                input: String::new(),
                error: Some(e.to_string()),
                saved,
            },
        }
    }

    fn submit(&mut self, ctx: &egui::Context) {
        let Some(wizard) = self.wizard.as_mut() else {
            return;
        };

        match wizard.submit(&self.input) {
            Ok(WizardProgress::Next(_)) => {
                self.input = wizard.initial_value().to_string();
            }
            Ok(WizardProgress::Complete(_)) => {
                self.wizard = None;
                self.saved.set(true);
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
            Err(e) => {
                // Validation failures abort the whole dialog, as a cancel would
                error!(error = %e, "Setup failed");
                self.wizard = None;
                self.error = Some(e.to_string());
            }
        }
    }

    fn cancel(&mut self, ctx: &egui::Context) {
        if let Some(wizard) = self.wizard.take() {
            wizard.cancel();
        }
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }

    fn prompt_ui(&mut self, ui: &mut egui::Ui) {
        let Some(wizard) = &self.wizard else {
            return;
        };

        match wizard.step() {
            SetupStep::Port => {
                ui.label("Select the serial port the device is connected to:");
                ui.add_space(ITEM_SPACING);
                let selected = wizard
                    .ports()
                    .iter()
                    .find(|p| p.name == self.input)
                    .map(|p| p.display_label())
                    .unwrap_or_else(|| self.input.clone());
                egui::ComboBox::from_id_salt("serial_port")
                    .selected_text(selected)
                    .width(ui.available_width())
                    .show_ui(ui, |ui| {
                        for port in wizard.ports() {
                            ui.selectable_value(&mut self.input, port.name.clone(), port.display_label());
                        }
                    });
            }
            SetupStep::NetworkName => {
                ui.label("Enter the Wi-Fi network name (SSID):");
                ui.add_space(ITEM_SPACING);
                let response = ui.add(egui::TextEdit::singleline(&mut self.input).desired_width(f32::INFINITY));
                response.request_focus();
            }
            SetupStep::NetworkSecret => {
                ui.label(format!("Enter the password for '{}':", wizard.network_name()));
                ui.add_space(ITEM_SPACING);
                let response = ui.add(
                    egui::TextEdit::singleline(&mut self.input)
                        .password(true)
                        .desired_width(f32::INFINITY),
                );
                response.request_focus();
            }
        }
    }
}

impl eframe::App for SetupApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(PADDING);

            if let Some(message) = &self.error {
                ui.heading("Error");
                ui.add_space(SECTION_SPACING);
                ui.colored_label(COLOR_ERROR, message.as_str());
                ui.add_space(SECTION_SPACING);
                if ui.button("Close").clicked() {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
                return;
            }

            let Some(step) = self.wizard.as_ref().map(SetupWizard::step) else {
                return;
            };
            let (heading, next_label) = match step {
                SetupStep::Port => ("Serial Port", "Next"),
                SetupStep::NetworkName => ("Wi-Fi SSID", "Next"),
                SetupStep::NetworkSecret => ("Wi-Fi Password", "Save"),
            };

            ui.heading(heading);
            ui.add_space(SECTION_SPACING);
            self.prompt_ui(ui);
            ui.add_space(SECTION_SPACING);

            let enter = ui.input(|i| i.key_pressed(egui::Key::Enter));
            ui.horizontal(|ui| {
                if ui.button(next_label).clicked() || enter {
                    self.submit(ctx);
                }
                if ui.button("Cancel").clicked() {
                    self.cancel(ctx);
                }
            });
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        // Window closed from the title bar mid-flow
        if let Some(wizard) = self.wizard.take() {
            wizard.cancel();
        }
    }
}

/// Show the setup dialog; returns whether settings were saved
pub fn run_setup_dialog(store: SettingsStore) -> Result<bool> {
    let ports = list_ports().unwrap_or_else(|e| {
        error!(error = ?e, "Failed to list serial ports");
        Vec::new()
    });
    info!(count = ports.len(), path = %store.path().display(), "Opening setup dialog");
    let wizard = SetupWizard::new(store, ports);

    let saved = Rc::new(Cell::new(false));
    let app_saved = Rc::clone(&saved);

    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([SETUP_WIDTH, SETUP_HEIGHT])
            .with_resizable(false)
            .with_always_on_top()
            .with_title("BongoCat Setup"),
        ..Default::default()
    };

    eframe::run_native(
        "BongoCat Setup",
        options,
        Box::new(move |_cc| Ok(Box::new(SetupApp::new(wizard, app_saved)))),
    )
    .map_err(|err| anyhow!("Failed to launch setup dialog: {err}"))?;

    Ok(saved.get())
}
