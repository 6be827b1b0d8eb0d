// Main application layout
// Header, query form, agent dashboard, result panels, and the activity log

use crate::state::{AgentRegistry, ChannelStatus, RunState, Store};
use crate::ui::components::*;
use eframe::egui;

/// Uncommitted query text typed into the form
#[derive(Debug, Clone, Default)]
pub struct QueryForm {
    pub draft: String,
}

impl QueryForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the draft may be submitted right now
    pub fn can_submit(&self, is_running: bool) -> bool {
        !is_running && !self.draft.trim().is_empty()
    }

    /// The query to submit, if the draft is non-blank and no run is active
    pub fn submission(&self, is_running: bool) -> Option<String> {
        self.can_submit(is_running).then(|| self.draft.clone())
    }
}

/// Render the main application layout
///
/// Returns the query to submit when the user submitted the form this frame.
pub fn render_app_layout(
    ctx: &egui::Context,
    run: &RunState,
    channel: ChannelStatus,
    form: &mut QueryForm,
    activity: &mut ActivityPanel,
    store: &Store,
) -> Option<String> {
    render_header(ctx, channel, activity);

    if activity.visible {
        egui::TopBottomPanel::bottom("activity_panel")
            .resizable(true)
            .default_height(160.0)
            .min_height(80.0)
            .show(ctx, |ui| activity.render(ui, store));
    }

    let mut submitted = None;
    egui::CentralPanel::default().show(ctx, |ui| {
        egui::ScrollArea::vertical()
            .id_source("main_scroll")
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                ui.add_space(12.0);
                submitted = render_query_form(ui, form, run.is_running);

                if let Some(error) = &run.error {
                    ui.add_space(12.0);
                    error_banner(ui, error);
                }

                ui.add_space(12.0);
                render_dashboard(ui, &run.agents);

                if let Some(answer) = &run.final_answer {
                    ui.add_space(16.0);
                    final_answer_panel(ui, answer);
                }
                ui.add_space(12.0);
            });
    });
    submitted
}

/// Render the top bar with the title and channel state
fn render_header(ctx: &egui::Context, channel: ChannelStatus, activity: &mut ActivityPanel) {
    egui::TopBottomPanel::top("header").show(ctx, |ui| {
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            ui.heading(egui::RichText::new("🤖 Advanced Multi-Agent Insurance System").strong());
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.checkbox(&mut activity.visible, "Activity log");
                ui.add_space(12.0);
                channel_indicator(ui, channel);
            });
        });
        ui.add_space(6.0);
    });
}

/// Render the query input and submit button
/// Returns the query when submitted via the button or Enter
fn render_query_form(ui: &mut egui::Ui, form: &mut QueryForm, is_running: bool) -> Option<String> {
    let mut requested = false;
    ui.horizontal(|ui| {
        let button_width = 140.0;
        let input_width = (ui.available_width() - button_width).max(120.0);
        let input = ui.add_sized(
            [input_width, 32.0],
            egui::TextEdit::singleline(&mut form.draft)
                .hint_text("Describe the insurance claim or question, e.g. \"46M, knee surgery in Pune, 3-month policy\""),
        );
        if input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            requested = true;
        }

        let label = if is_running { "Processing..." } else { "Submit Query" };
        let button = ui.add_enabled(
            form.can_submit(is_running),
            egui::Button::new(egui::RichText::new(label).strong()).min_size(egui::vec2(button_width - 8.0, 32.0)),
        );
        if button.clicked() {
            requested = true;
        }
    });

    if requested {
        form.submission(is_running)
    } else {
        None
    }
}

/// Render one card per agent, in registry order
pub fn render_dashboard(ui: &mut egui::Ui, agents: &AgentRegistry) {
    ui.heading("Agent Activity Dashboard");
    ui.add_space(8.0);
    ui.horizontal_wrapped(|ui| {
        ui.spacing_mut().item_spacing = egui::vec2(12.0, 12.0);
        for (name, state) in agents.iter() {
            agent_card(ui, name, state);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_draft_is_not_submitted() {
        let mut form = QueryForm::new();
        assert_eq!(form.submission(false), None);

        form.draft = "   \t ".to_string();
        assert!(!form.can_submit(false));
        assert_eq!(form.submission(false), None);
    }

    #[test]
    fn test_draft_is_submitted_untrimmed() {
        let form = QueryForm {
            draft: "  knee surgery claim ".to_string(),
        };
        assert_eq!(
            form.submission(false).as_deref(),
            Some("  knee surgery claim ")
        );
    }

    #[test]
    fn test_no_submission_while_running() {
        let form = QueryForm {
            draft: "knee surgery claim".to_string(),
        };
        assert!(!form.can_submit(true));
        assert_eq!(form.submission(true), None);
    }
}
