//! Input panel with the prompt box and send button

use bevy::prelude::*;
use bevy_egui::egui;

use crate::events::AppCommand;
use crate::state::{CoreConnection, InputState, LeftView, WorkbenchState};

pub fn render(
    ctx: &mut egui::Context,
    state: &mut ResMut<WorkbenchState>,
    input: &mut ResMut<InputState>,
    connection: &Res<CoreConnection>,
) {
    egui::TopBottomPanel::bottom("input_panel")
        .exact_height(56.0)
        .show(ctx, |ui| {
            ui.add_space(8.0);
            ui.horizontal(|ui| {
                let available = ui.available_width();
                let button_width = 80.0;
                let input_width = (available - button_width).max(100.0);

                let input_response = ui.add_sized(
                    [input_width, 32.0],
                    egui::TextEdit::singleline(&mut input.input_text)
                        .hint_text("Describe a diagram, or ask for a change..."),
                );

                let enter_pressed =
                    input_response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                let send_clicked = ui.add_sized([60.0, 32.0], egui::Button::new("Send")).clicked();

                // Sending while a job runs is fine; the engine queues it
                if (send_clicked || enter_pressed) && !input.input_text.trim().is_empty() {
                    send_prompt(state, input, connection);
                    input_response.request_focus();
                }
            });
        });
}

fn send_prompt(
    state: &mut ResMut<WorkbenchState>,
    input: &mut ResMut<InputState>,
    connection: &Res<CoreConnection>,
) {
    let text = std::mem::take(&mut input.input_text).trim().to_string();
    connection.send(AppCommand::Submit(text));
    input.view = LeftView::Chat;
    state.scroll_to_bottom = true;
}
