//! Single message window with an OK button

use anyhow::{anyhow, Result};
use eframe::{egui, NativeOptions};

use super::constants::*;
use crate::notify::Severity;

fn severity_color(severity: Severity) -> egui::Color32 {
    match severity {
        Severity::Info => COLOR_INFO,
        Severity::Warning => COLOR_WARNING,
        Severity::Error => COLOR_ERROR,
    }
}

struct NoticeApp {
    severity: Severity,
    message: String,
}

impl eframe::App for NoticeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(PADDING);
            ui.colored_label(severity_color(self.severity), "\u{25CF}");
            ui.add_space(ITEM_SPACING);
            ui.label(&self.message);
            ui.add_space(SECTION_SPACING);
            let enter = ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("OK").clicked() || enter {
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        });
    }
}

/// Show `message` and block until the window is dismissed
pub fn run_notice(severity: Severity, title: &str, message: &str) -> Result<()> {
    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([NOTICE_WIDTH, NOTICE_HEIGHT])
            .with_resizable(false)
            .with_always_on_top()
            .with_title(title),
        ..Default::default()
    };

    let app = NoticeApp {
        severity,
        message: message.to_string(),
    };
    eframe::run_native(title, options, Box::new(move |_cc| Ok(Box::new(app))))
        .map_err(|err| anyhow!("Failed to show notice: {err}"))
}
