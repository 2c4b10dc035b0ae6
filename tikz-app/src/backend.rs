//! Async backend runner - owns the tokio runtime and the diagram engine

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;
use tikz_core::{AppContext, DiagramEngine};

use crate::events::{AppCommand, CoreEvent};

/// Spawn the async backend in a separate thread
pub fn spawn_async_backend(
    context: AppContext,
    cmd_rx: Receiver<AppCommand>,
    event_tx: Sender<CoreEvent>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("tikz-backend".to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!("Failed to create Tokio runtime: {}", e);
                    let _ = event_tx.send(CoreEvent::Error(format!(
                        "Failed to start background worker: {}",
                        e
                    )));
                    return;
                }
            };
            rt.block_on(run_backend(context, cmd_rx, event_tx));
            // Dropping the runtime kills any child process still attached to it
        })
}

async fn run_backend(context: AppContext, cmd_rx: Receiver<AppCommand>, event_tx: Sender<CoreEvent>) {
    let model = context.model_name().to_string();
    let mut engine = DiagramEngine::new(context);
    let _ = event_tx.send(CoreEvent::Ready { model });
    tracing::info!("Backend started");

    loop {
        // Check for commands (non-blocking)
        match cmd_rx.try_recv() {
            Ok(AppCommand::Submit(text)) => {
                let job = engine.submit(text);
                tracing::debug!(job, "Prompt submitted");
            }
            Ok(AppCommand::ApplyCode(source)) => {
                let job = engine.apply_code(source);
                tracing::debug!(job, "Code applied");
            }
            Ok(AppCommand::ClearHistory) => engine.clear_history(),
            Ok(AppCommand::Shutdown) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        // Forward engine events (non-blocking)
        while let Some(event) = engine.try_recv() {
            if event_tx.send(CoreEvent::Engine(event)).is_err() {
                tracing::debug!("UI has gone away");
            }
        }

        // Small sleep to avoid busy-waiting
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    }

    tracing::info!("Backend shutting down");
    engine.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use config::{AppConfig, Settings};
    use crossbeam_channel::unbounded;
    use std::sync::Arc;
    use std::time::Duration;
    use tikz_core::{
        EngineEvent, GenerationError, Generator, Message, RenderError, RenderRequest,
        RenderedImage, Renderer,
    };

    struct FixedGenerator;

    #[async_trait]
    impl Generator for FixedGenerator {
        async fn generate(&self, _history: &[Message]) -> Result<String, GenerationError> {
            Ok("```\n\\draw (0,0) -- (1,1);\n```".to_string())
        }
    }

    struct TinyRenderer;

    #[async_trait]
    impl Renderer for TinyRenderer {
        async fn render(&self, _request: RenderRequest) -> Result<RenderedImage, RenderError> {
            Ok(RenderedImage {
                png: vec![1u8; 4].into(),
                width: 2,
                height: 2,
            })
        }
    }

    fn context() -> AppContext {
        let config = AppConfig::resolve(&Settings::default(), |key| {
            (key == "TIKZ_API_KEY").then(|| "k".to_string())
        })
        .unwrap();
        AppContext::new(config, Arc::new(FixedGenerator), Arc::new(TinyRenderer))
    }

    fn recv(rx: &Receiver<CoreEvent>) -> CoreEvent {
        rx.recv_timeout(Duration::from_secs(5)).expect("backend went quiet")
    }

    #[test]
    fn test_backend_round_trip_and_shutdown() {
        let (cmd_tx, cmd_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let handle = spawn_async_backend(context(), cmd_rx, event_tx).unwrap();

        assert!(matches!(recv(&event_rx), CoreEvent::Ready { .. }));

        cmd_tx.send(AppCommand::Submit("a line".into())).unwrap();
        let mut saw_render = false;
        loop {
            match recv(&event_rx) {
                CoreEvent::Engine(EngineEvent::Rendered { version, .. }) => {
                    assert_eq!(version.tikz_source, "\\draw (0,0) -- (1,1);");
                    saw_render = true;
                }
                CoreEvent::Engine(EngineEvent::JobFinished { .. }) => break,
                CoreEvent::Engine(EngineEvent::Failed { error, .. }) => {
                    panic!("unexpected failure: {}", error)
                }
                _ => {}
            }
        }
        assert!(saw_render);

        cmd_tx.send(AppCommand::Shutdown).unwrap();
        handle.join().unwrap();
        // Backend dropped its sender on the way out
        assert!(event_rx.recv_timeout(Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_backend_stops_when_ui_hangs_up() {
        let (cmd_tx, cmd_rx) = unbounded();
        let (event_tx, _event_rx) = unbounded();
        let handle = spawn_async_backend(context(), cmd_rx, event_tx).unwrap();

        drop(cmd_tx);
        handle.join().unwrap();
    }
}
