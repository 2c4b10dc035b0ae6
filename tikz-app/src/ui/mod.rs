//! UI module - composable egui panels

mod input_panel;
mod preview_panel;
mod side_panel;
mod top_panel;

use bevy::prelude::*;
use bevy_egui::EguiContexts;

use crate::state::{CoreConnection, InputState, PreviewTexture, WorkbenchState};

/// Main UI system that composes all panels
pub fn ui_system(
    mut contexts: EguiContexts,
    mut state: ResMut<WorkbenchState>,
    mut input: ResMut<InputState>,
    mut preview: ResMut<PreviewTexture>,
    connection: Res<CoreConnection>,
) {
    let ctx = contexts.ctx_mut();

    top_panel::render(ctx, &state, &mut input, &connection);

    input_panel::render(ctx, &mut state, &mut input, &connection);

    side_panel::render(ctx, &mut state, &input, &connection);

    preview_panel::render(ctx, &state, &mut preview);
}
