//! GUI-specific constants for layout and severity colors

use egui;

/// Setup dialog dimensions
pub const SETUP_WIDTH: f32 = 420.0;
pub const SETUP_HEIGHT: f32 = 220.0;

/// Notice window dimensions
pub const NOTICE_WIDTH: f32 = 380.0;
pub const NOTICE_HEIGHT: f32 = 160.0;

/// Layout spacing
pub const PADDING: f32 = 8.0;
pub const SECTION_SPACING: f32 = 15.0;
pub const ITEM_SPACING: f32 = 8.0;

/// Severity colors
pub const COLOR_INFO: egui::Color32 = egui::Color32::from_rgb(0, 200, 0);
pub const COLOR_WARNING: egui::Color32 = egui::Color32::from_rgb(200, 200, 0);
pub const COLOR_ERROR: egui::Color32 = egui::Color32::from_rgb(200, 0, 0);
