//! TikZ Studio - describe a diagram, get TikZ, see it rendered
//!
//! Architecture:
//! - Main thread (Bevy): Windowing, input, egui layout, preview textures
//! - Background thread (Tokio): model API calls, pdflatex/pdftoppm subprocesses
//!
//! Communication via crossbeam channels (AppCommand -> Core, CoreEvent -> UI)

mod backend;
mod events;
mod highlight;
mod logging;
mod state;
mod systems;
mod ui;

use anyhow::Context as _;
use bevy::prelude::*;
use bevy_egui::EguiPlugin;
use crossbeam_channel::unbounded;

use config::{load_env_file, AppConfig, PathManager, Settings};
use tikz_core::AppContext;

use backend::spawn_async_backend;
use events::{AppCommand, CoreEvent};
use state::{CoreConnection, InputState, PreviewTexture, WorkbenchState};
use systems::{event_reader_system, setup_egui, shutdown_system};
use ui::ui_system;

/// Load settings, then wire the pipeline.
fn bootstrap() -> anyhow::Result<AppContext> {
    let settings = Settings::load()?;
    let config = AppConfig::from_env(&settings)?;
    tracing::debug!(?config, "Configuration resolved");
    AppContext::from_config(config)
}

fn main() {
    // The data dir override decides where logs and settings live
    load_env_file();
    let data_dir = PathManager::init_from_env();
    logging::init_logging();
    tracing::info!("Starting TikZ Studio");
    if let Some(dir) = data_dir {
        tracing::info!("Using data directory {:?}", dir);
    }

    let context = match bootstrap() {
        Ok(context) => context,
        Err(e) => {
            tracing::error!("Startup failed: {:#}", e);
            eprintln!("tikz-studio: {:#}", e);
            std::process::exit(1);
        }
    };

    let (cmd_tx, cmd_rx) = unbounded::<AppCommand>();
    let (event_tx, event_rx) = unbounded::<CoreEvent>();

    let backend = match spawn_async_backend(context, cmd_rx, event_tx)
        .context("Failed to spawn backend thread")
    {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("tikz-studio: {:#}", e);
            std::process::exit(1);
        }
    };

    App::new()
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "TikZ Studio".to_string(),
                        resolution: (1280.0, 800.0).into(),
                        prevent_default_event_handling: false,
                        ..default()
                    }),
                    ..default()
                })
                // Our own subscriber is already installed
                .disable::<bevy::log::LogPlugin>(),
        )
        .add_plugins(EguiPlugin)
        .insert_resource(CoreConnection {
            cmd_tx,
            event_rx,
            backend: Some(backend),
        })
        .insert_resource(WorkbenchState::default())
        .insert_resource(InputState::default())
        .insert_resource(PreviewTexture::default())
        .add_systems(Startup, setup_egui)
        .add_systems(Update, (event_reader_system, ui_system).chain())
        .add_systems(Last, shutdown_system)
        .run();
}
