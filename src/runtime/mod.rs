use std::env;
use std::path::PathBuf;
use std::sync::{Arc, mpsc};
use std::time::Duration;

use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};

use crate::app::App;
use crate::audio::{RodioBackend, SessionManager};
use crate::mpris::{ControlCmd, spawn_mpris};

mod event_loop;
mod logging;
mod settings;
mod startup;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (settings, settings_problem) = settings::load_settings();

    let data_dir = settings
        .storage
        .resolve_data_dir()
        .ok_or("cannot determine a data directory; set storage.data_dir")?;
    logging::init_logging(&data_dir, &settings.logging.level)?;
    if let Some(problem) = settings_problem {
        warn!(%problem, "using default settings");
    }
    info!(version = env!("CARGO_PKG_VERSION"), "starting");

    let args: Vec<PathBuf> = env::args_os().skip(1).map(PathBuf::from).collect();
    let mut catalog = startup::open_catalog(&data_dir, &settings)?;
    let import_status = startup::import_args(&mut catalog, &args);

    let backend = RodioBackend::open_default()?;
    let (control_tx, control_rx) = mpsc::channel::<ControlCmd>();
    let mpris = Arc::new(spawn_mpris(control_tx, data_dir.join(startup::ART_DIR)));

    let manager = SessionManager::new(
        backend,
        mpris,
        Duration::from_millis(settings.playback.sync_interval_ms),
    );
    manager.set_volume(settings.playback.initial_volume);
    let events = manager.subscribe();

    let mut app = App::new(catalog.len());
    app.set_playback(manager.snapshot());
    if let Some(msg) = import_status {
        app.set_status(msg);
    }

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let run_result: Result<(), Box<dyn std::error::Error>> = (|| {
        let mut state = event_loop::EventLoopState::default();

        event_loop::run(
            &mut terminal,
            &settings,
            &mut app,
            &mut catalog,
            &manager,
            &events,
            &control_rx,
            &mut state,
        )
    })();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    manager.stop();
    info!("exiting");
    run_result
}
