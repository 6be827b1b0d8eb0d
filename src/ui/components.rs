// Reusable UI components
// Status badge, agent card, banners, and the activity log panel

use crate::state::{AgentState, AgentStatus, ChannelStatus, Store};
use eframe::egui;
use std::borrow::Cow;

/// Characters of an agent result shown on its card
pub const RESULT_PREVIEW_CHARS: usize = 150;

/// Fixed width of an agent card
pub const CARD_WIDTH: f32 = 230.0;

/// Visual variant of one agent status
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusStyle {
    pub fill: egui::Color32,
    pub text: egui::Color32,
    pub icon: &'static str,
}

/// Colors and icon for a status
/// Pending (gray), Processing (blue), Complete (green), Error (red)
pub fn status_style(status: AgentStatus) -> StatusStyle {
    match status {
        AgentStatus::Pending => StatusStyle {
            fill: egui::Color32::from_rgb(55, 65, 81),
            text: egui::Color32::from_rgb(209, 213, 219),
            icon: "⏳",
        },
        AgentStatus::Processing => StatusStyle {
            fill: egui::Color32::from_rgb(30, 58, 138),
            text: egui::Color32::from_rgb(191, 219, 254),
            icon: "🔄",
        },
        AgentStatus::Complete => StatusStyle {
            fill: egui::Color32::from_rgb(20, 83, 45),
            text: egui::Color32::from_rgb(187, 247, 208),
            icon: "✅",
        },
        AgentStatus::Error => StatusStyle {
            fill: egui::Color32::from_rgb(127, 29, 29),
            text: egui::Color32::from_rgb(254, 202, 202),
            icon: "❌",
        },
    }
}

/// Result text as shown on a card: the first 150 characters plus an
/// ellipsis when longer, otherwise unchanged
pub fn result_preview(result: &str) -> Cow<'_, str> {
    match result.char_indices().nth(RESULT_PREVIEW_CHARS) {
        Some((cut, _)) => Cow::Owned(format!("{}...", &result[..cut])),
        None => Cow::Borrowed(result),
    }
}

/// Render the uppercase status label in the status color
pub fn status_badge(ui: &mut egui::Ui, status: AgentStatus) {
    let style = status_style(status);
    ui.label(
        egui::RichText::new(status.as_str().to_uppercase())
            .color(style.text)
            .strong()
            .size(12.0),
    );
}

/// Render one agent's status card
pub fn agent_card(ui: &mut egui::Ui, name: &str, state: &AgentState) {
    let style = status_style(state.status);
    egui::Frame::none()
        .fill(style.fill)
        .rounding(egui::Rounding::same(8.0))
        .stroke(egui::Stroke::new(1.0, egui::Color32::from_rgb(75, 85, 99)))
        .inner_margin(egui::Margin::same(12.0))
        .show(ui, |ui| {
            ui.set_width(CARD_WIDTH);
            ui.vertical(|ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        egui::RichText::new(name)
                            .strong()
                            .size(16.0)
                            .color(egui::Color32::WHITE),
                    );
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(egui::RichText::new(style.icon).size(20.0));
                    });
                });
                ui.add_space(4.0);
                status_badge(ui, state.status);

                if !state.result.is_empty() {
                    ui.add_space(8.0);
                    egui::Frame::none()
                        .fill(egui::Color32::from_black_alpha(50))
                        .rounding(egui::Rounding::same(4.0))
                        .inner_margin(egui::Margin::same(6.0))
                        .show(ui, |ui| {
                            ui.label(
                                egui::RichText::new(result_preview(&state.result))
                                    .size(11.0)
                                    .color(egui::Color32::from_rgb(156, 163, 175)),
                            );
                        });
                }
            });
        });
}

/// Render the error banner for a failed run
pub fn error_banner(ui: &mut egui::Ui, message: &str) {
    egui::Frame::none()
        .fill(egui::Color32::from_rgb(127, 29, 29))
        .rounding(egui::Rounding::same(6.0))
        .inner_margin(egui::Margin::same(12.0))
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.label(
                egui::RichText::new(format!("Error: {}", message))
                    .color(egui::Color32::from_rgb(254, 202, 202)),
            );
        });
}

/// Render the final answer of a finished run
pub fn final_answer_panel(ui: &mut egui::Ui, answer: &str) {
    egui::Frame::group(ui.style())
        .inner_margin(egui::Margin::same(16.0))
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.heading("Final Answer");
            ui.add_space(8.0);
            ui.label(egui::RichText::new(answer).size(14.0));
        });
}

/// Render the realtime channel state as a colored dot and label
pub fn channel_indicator(ui: &mut egui::Ui, status: ChannelStatus) {
    let color = match status {
        ChannelStatus::Connected => egui::Color32::from_rgb(0, 200, 0),
        ChannelStatus::Connecting => egui::Color32::from_rgb(220, 180, 0),
        ChannelStatus::Disconnected => egui::Color32::from_rgb(220, 0, 0),
    };
    ui.colored_label(color, format!("● {}", status.label()));
}

/// Activity log display area
/// Scrollable view over the store's activity log
pub struct ActivityPanel {
    /// Whether the panel is expanded
    pub visible: bool,
    /// Whether to auto-scroll to bottom
    auto_scroll: bool,
}

impl ActivityPanel {
    pub fn new() -> Self {
        Self {
            visible: true,
            auto_scroll: true,
        }
    }

    pub fn render(&mut self, ui: &mut egui::Ui, store: &Store) {
        ui.add_space(8.0);
        ui.horizontal(|ui| {
            ui.add_space(8.0);
            ui.label(egui::RichText::new("Activity").heading());
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.add_space(8.0);
                if ui.button("Clear").clicked() {
                    store.clear_activity();
                }
                ui.add_space(8.0);
                ui.checkbox(&mut self.auto_scroll, "Auto-scroll");
            });
        });
        ui.add_space(4.0);
        ui.separator();
        ui.add_space(4.0);

        let entries = store.activity_entries();
        egui::ScrollArea::vertical()
            .id_source("activity_log_scroll")
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                ui.spacing_mut().item_spacing = egui::vec2(4.0, 2.0);
                for entry in &entries {
                    ui.horizontal(|ui| {
                        ui.add_space(8.0);
                        ui.label(
                            egui::RichText::new(entry.display())
                                .size(12.0)
                                .family(egui::FontFamily::Monospace),
                        );
                    });
                }

                if self.auto_scroll && !entries.is_empty() {
                    ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                }
            });
    }
}

impl Default for ActivityPanel {
    fn default() -> Self {
        Self::new()
    }
}
