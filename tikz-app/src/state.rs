//! Bevy resources for UI state

use bevy::prelude::*;
use bevy_egui::egui;
use crossbeam_channel::{Receiver, Sender};
use std::thread::JoinHandle;
use tikz_core::Workbench;

use crate::events::{AppCommand, CoreEvent};

/// Holds channels for communicating with the async backend
#[derive(Resource)]
pub struct CoreConnection {
    pub cmd_tx: Sender<AppCommand>,
    pub event_rx: Receiver<CoreEvent>,
    /// Taken on exit so the thread can be joined
    pub backend: Option<JoinHandle<()>>,
}

impl CoreConnection {
    pub fn send(&self, cmd: AppCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::warn!("Backend is not running; command dropped");
        }
    }

    /// Ask the backend to stop and join its thread. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.backend.take() else {
            return;
        };
        tracing::info!("Stopping backend");
        self.send(AppCommand::Shutdown);
        if handle.join().is_err() {
            tracing::error!("Backend thread panicked");
        }
    }
}

impl Drop for CoreConnection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Toolkit-independent view state: chat log, editor buffer, preview image
#[derive(Resource, Default)]
pub struct WorkbenchState {
    pub bench: Workbench,
    pub model_name: Option<String>,
    pub scroll_to_bottom: bool,
}

/// Which view the left pane shows
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LeftView {
    #[default]
    Chat,
    Code,
}

/// Prompt text and left pane selection
#[derive(Resource, Default)]
pub struct InputState {
    pub input_text: String,
    pub view: LeftView,
}

/// Uploaded copy of the current preview image
#[derive(Resource, Default)]
pub struct PreviewTexture {
    pub texture: Option<egui::TextureHandle>,
    /// Workbench preview revision the texture was built from
    pub revision: u64,
    /// Set when the preview bytes could not be decoded
    pub error: Option<String>,
}
