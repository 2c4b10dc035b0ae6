//! Commands and Events for async bridge between UI and backend

use tikz_core::EngineEvent;

/// Commands from UI to Core (async backend)
#[derive(Debug, Clone)]
pub enum AppCommand {
    Submit(String),
    ApplyCode(String),
    ClearHistory,
    Shutdown,
}

/// Events from Core to UI
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// Backend is running and talking to this model
    Ready { model: String },
    Engine(EngineEvent),
    /// Backend could not start or stopped unexpectedly
    Error(String),
}
