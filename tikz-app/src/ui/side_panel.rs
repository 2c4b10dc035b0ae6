//! Left pane: chat log or the TikZ editor

use bevy::prelude::*;
use bevy_egui::egui;
use tikz_core::{LogEntry, LogKind};

use crate::events::AppCommand;
use crate::highlight;
use crate::state::{CoreConnection, InputState, LeftView, WorkbenchState};

pub fn render(
    ctx: &mut egui::Context,
    state: &mut ResMut<WorkbenchState>,
    input: &ResMut<InputState>,
    connection: &Res<CoreConnection>,
) {
    egui::SidePanel::left("left_panel")
        .resizable(true)
        .default_width(460.0)
        .min_width(280.0)
        .show(ctx, |ui| match input.view {
            LeftView::Chat => render_chat(ui, state),
            LeftView::Code => render_code(ui, state, connection),
        });
}

fn render_chat(ui: &mut egui::Ui, state: &mut ResMut<WorkbenchState>) {
    let stick = state.scroll_to_bottom;
    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .stick_to_bottom(stick)
        .show(ui, |ui| {
            ui.set_min_width(ui.available_width());
            for entry in state.bench.log() {
                render_entry(ui, entry);
            }
        });
    state.scroll_to_bottom = false;
}

fn render_entry(ui: &mut egui::Ui, entry: &LogEntry) {
    ui.add_space(6.0);

    let (label, label_color, bg_color) = match entry.kind {
        LogKind::User => (
            "You",
            egui::Color32::from_rgb(100, 180, 255),
            egui::Color32::from_gray(50),
        ),
        LogKind::Assistant => (
            "Assistant",
            egui::Color32::from_rgb(100, 200, 100),
            egui::Color32::from_gray(40),
        ),
        LogKind::Error => (
            "Error",
            egui::Color32::from_rgb(255, 110, 110),
            egui::Color32::from_rgb(60, 30, 30),
        ),
        LogKind::Info => (
            "Info",
            egui::Color32::from_rgb(255, 200, 100),
            egui::Color32::from_gray(35),
        ),
    };

    ui.colored_label(label_color, label);
    egui::Frame::none()
        .fill(bg_color)
        .rounding(4.0)
        .inner_margin(8.0)
        .show(ui, |ui| {
            ui.set_min_width(ui.available_width());
            if entry.kind == LogKind::Assistant {
                ui.label(egui::RichText::new(&entry.text).monospace());
            } else {
                ui.label(&entry.text);
            }
        });
}

fn render_code(
    ui: &mut egui::Ui,
    state: &mut ResMut<WorkbenchState>,
    connection: &Res<CoreConnection>,
) {
    let to_apply = state.bench.code_to_apply();
    ui.horizontal(|ui| {
        let apply = ui
            .add_enabled(to_apply.is_some(), egui::Button::new("Apply"))
            .on_hover_text("Render the editor contents");
        if apply.clicked() {
            if let Some(source) = to_apply {
                connection.send(AppCommand::ApplyCode(source));
            }
        }
        if let Some(version) = state.bench.current() {
            ui.label(
                egui::RichText::new(format!("Diagram #{} ({:?})", version.job, version.status))
                    .small()
                    .color(egui::Color32::GRAY),
            );
        }
    });
    ui.separator();

    let mut layouter = |ui: &egui::Ui, code: &str, wrap_width: f32| {
        highlight::layouter(ui, code, wrap_width)
    };

    egui::Frame::none()
        .fill(highlight::BACKGROUND)
        .inner_margin(6.0)
        .show(ui, |ui| {
            egui::ScrollArea::both()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    ui.add(
                        egui::TextEdit::multiline(state.bench.code_mut())
                            .code_editor()
                            .frame(false)
                            .desired_width(f32::INFINITY)
                            .desired_rows(30)
                            .layouter(&mut layouter),
                    );
                });
        });
}
