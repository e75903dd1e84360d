use anyhow::Result;
use reverie::chat::ChatPipeline;
use reverie::config::AppConfig;
use reverie::conversation::Orchestrator;
use reverie::session::SessionStore;
use reverie::speech::{self, VoiceCaptureController};
use reverie::ui::{AppState, ReverieApp};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reverie=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Reverie");

    let config = AppConfig::from_env();

    // Fresh launch always starts blank; the store then mirrors every
    // message-sequence change.
    let store = SessionStore::open(SessionStore::default_path())?;

    let pipeline = ChatPipeline::new(config.chat.clone());
    let chat_tx = pipeline.command_sender();
    let chat_rx = pipeline.event_receiver();
    pipeline.start_worker()?;

    let orchestrator = Orchestrator::new(store, chat_tx, chat_rx);

    let factory = speech::probe(&config.speech);
    let voice = VoiceCaptureController::new(factory, config.speech.timings.clone());

    let state = AppState::new(orchestrator, voice);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([480.0, 720.0])
            .with_min_inner_size([360.0, 480.0])
            .with_title("Reverie"),
        ..Default::default()
    };

    eframe::run_native(
        "Reverie",
        options,
        Box::new(|cc| Ok(Box::new(ReverieApp::new(cc, state)))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to start UI: {e}"))?;

    Ok(())
}
