use std::env;
use std::path::PathBuf;
use std::sync::mpsc;

use tracing::{info, warn};

use crate::config;
use crate::error::Result;
use crate::events::EventBus;
use crate::library::scan;
use crate::mpris::ControlCmd;
use crate::player::{EngineSettings, PlaybackEngine, RodioOutput};
use crate::queue::QueueModel;

mod commands;
mod event_loop;
mod logging;
mod settings;
mod startup;

const USAGE: &str = "usage: encore [--print-config] [DIR]";

/// Run the player until `quit` or end of input.
pub fn run() -> Result<()> {
    let arg = env::args().nth(1);
    match arg.as_deref() {
        Some("-h" | "--help") => {
            println!("{USAGE}\n{}", commands::HELP);
            return Ok(());
        }
        Some("--print-config") => {
            print!("{}", config::Settings::default().to_toml()?);
            return Ok(());
        }
        _ => {}
    }

    let (settings, load_error) = settings::load_settings();
    logging::init(&settings.logging);
    if let Some(e) = load_error {
        // Config is optional; failures should not prevent the player from starting.
        warn!(error = %e, "failed to load config, using defaults");
    }

    let dir = match arg {
        Some(d) => PathBuf::from(d),
        None => env::current_dir()?,
    };
    let songs = scan(&dir, &settings.library);
    if songs.is_empty() {
        warn!(dir = ?dir, "no audio files found");
    }

    let output = RodioOutput::open()?;
    let bus = EventBus::new();
    let events = bus.subscribe();
    let mut engine = PlaybackEngine::new(
        output,
        QueueModel::new(bus),
        EngineSettings::from(&settings.player),
    );
    startup::apply_playback_defaults(&mut engine, &settings, songs);

    let (control_tx, control_rx) = mpsc::channel::<ControlCmd>();
    let mpris = crate::mpris::spawn_mpris(control_tx.clone());
    mpris.set_modes(engine.queue().play_mode(), engine.queue().repeat_mode());
    engine.set_media_session(Box::new(mpris.clone()));

    commands::spawn_stdin_reader(control_tx);
    info!(tracks = engine.queue().len(), "ready; type `help` for commands");

    event_loop::run(&mut engine, &settings, &mpris, &control_rx, &events);
    Ok(())
}
