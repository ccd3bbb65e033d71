mod controls;
mod pipeline;
mod settings;

pub use controls::{apply, Control};
pub use pipeline::{render_overlay, Pipeline};
pub use settings::{CaptureSettings, Settings, DEFAULT_SETTINGS};

use anyhow::Result;
use maple_bot::LogDriver;
use maple_capture::MonitorSource;
use maple_state::{GameState, Routine};
use maple_vision::Templates;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Load everything, run the loops until the user quits, then shut down.
///
/// Settings, templates and the routine are all loaded before any loop
/// starts; an invalid routine stops the program here.
pub async fn run(settings_path: &Path) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "auto_maple=debug,auto_maple_lib=debug,maple_capture=info,maple_vision=info,maple_bot=debug,maple_state=info"
                    .into()
            }),
        )
        .init();

    let settings = Settings::load(settings_path)?;
    let routine = match &settings.routine {
        Some(path) => Routine::load(path)?,
        None => {
            info!("No routine configured, the bot will idle");
            Routine::new(Vec::new())
        }
    };
    let templates = Templates::load(&settings.assets_dir, &settings.vision.rune_ranges)?;

    let state = Arc::new(GameState::with_routine(routine));
    state.set_record_layout(settings.record_layout);
    state.set_enabled(settings.start_enabled);

    let source = MonitorSource::new(settings.capture.monitor, settings.capture.region);
    let pipeline = Pipeline::start(
        &settings,
        state,
        templates,
        Box::new(source),
        Arc::new(LogDriver),
    );

    let outcome = controls::listen(&pipeline).await;
    pipeline.shutdown().await;
    outcome
}
