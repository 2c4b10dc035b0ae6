//! Top panel with title, view toggle, and status

use bevy::prelude::*;
use bevy_egui::egui;

use crate::events::AppCommand;
use crate::state::{CoreConnection, InputState, LeftView, WorkbenchState};

pub fn render(
    ctx: &mut egui::Context,
    state: &ResMut<WorkbenchState>,
    input: &mut ResMut<InputState>,
    connection: &Res<CoreConnection>,
) {
    egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
        ui.horizontal(|ui| {
            ui.heading("TikZ Studio");
            ui.separator();
            ui.selectable_value(&mut input.view, LeftView::Chat, "Chat");
            ui.selectable_value(&mut input.view, LeftView::Code, "Code");
            ui.separator();
            if let Some(model) = &state.model_name {
                ui.label(egui::RichText::new(model).small().color(egui::Color32::GRAY));
                ui.separator();
            }
            render_status(ui, state);
            render_clear_button(ui, connection);
        });
    });
}

fn render_status(ui: &mut egui::Ui, state: &ResMut<WorkbenchState>) {
    let bench = &state.bench;
    if bench.is_busy() {
        ui.spinner();
    }
    ui.label(bench.status());

    // Jobs waiting behind the running one
    let waiting = bench.pending_jobs().saturating_sub(usize::from(bench.running().is_some()));
    if waiting > 0 {
        ui.colored_label(egui::Color32::YELLOW, format!("({} queued)", waiting));
    }
}

fn render_clear_button(ui: &mut egui::Ui, connection: &Res<CoreConnection>) {
    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
        if ui
            .button("Clear")
            .on_hover_text("Forget the conversation; the current diagram stays")
            .clicked()
        {
            connection.send(AppCommand::ClearHistory);
        }
    });
}
