//! Bevy systems for event handling, egui setup, and shutdown

use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts};
use crossbeam_channel::TryRecvError;

use crate::events::CoreEvent;
use crate::state::{CoreConnection, WorkbenchState};

/// System to read events from the Core and update UI state
pub fn event_reader_system(mut connection: ResMut<CoreConnection>, mut state: ResMut<WorkbenchState>) {
    loop {
        match connection.event_rx.try_recv() {
            Ok(CoreEvent::Ready { model }) => {
                state.model_name = Some(model);
            }
            Ok(CoreEvent::Engine(event)) => {
                state.bench.handle(event);
                state.scroll_to_bottom = true;
            }
            Ok(CoreEvent::Error(err)) => {
                state.bench.notice(format!("Error: {}", err));
                state.scroll_to_bottom = true;
            }
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => {
                // Report once, then stop polling a dead channel
                if let Some(handle) = connection.backend.take() {
                    let _ = handle.join();
                    tracing::error!("Backend thread stopped");
                    state.bench.notice("Background worker stopped; restart the application");
                }
                break;
            }
        }
    }
}

/// One-time setup system for egui styling
pub fn setup_egui(mut contexts: EguiContexts) {
    let ctx = contexts.ctx_mut();
    ctx.set_visuals(egui::Visuals::dark());
}

/// Tell the backend to stop and wait for it once the app is exiting
pub fn shutdown_system(mut exit_events: EventReader<AppExit>, mut connection: ResMut<CoreConnection>) {
    if exit_events.read().next().is_some() {
        connection.shutdown();
    }
}
