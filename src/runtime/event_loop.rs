use std::sync::mpsc::Receiver;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};

use crate::app::App;
use crate::audio::{AudioBackend, PlaybackEvent, PlaybackState, SessionManager};
use crate::config;
use crate::library::{Catalog, KeyValueStore, MetadataExtractor};
use crate::mpris::ControlCmd;
use crate::ui;

/// What a key press asks for, independent of the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Next,
    Prev,
    First,
    Last,
    PlaySelected,
    Toggle,
    Stop,
    ScrubBack,
    ScrubForward,
    VolumeUp,
    VolumeDown,
    DeleteSelected,
    Quit,
}

/// State tracked by the runtime event loop across iterations.
#[derive(Debug, Default)]
pub struct EventLoopState {
    /// Internal two-key prefix state used for `gg` handling.
    pub pending_gg: bool,
}

impl EventLoopState {
    /// Decode a key press. A lone `g` only arms the `gg` prefix.
    pub fn action_for(&mut self, key: KeyEvent) -> Option<Action> {
        let pending_gg = std::mem::take(&mut self.pending_gg);
        let action = match key.code {
            KeyCode::Char('g') => {
                if pending_gg {
                    Action::First
                } else {
                    self.pending_gg = true;
                    return None;
                }
            }
            KeyCode::Char('G') | KeyCode::End => Action::Last,
            KeyCode::Home => Action::First,
            KeyCode::Char('j') | KeyCode::Down => Action::Next,
            KeyCode::Char('k') | KeyCode::Up => Action::Prev,
            KeyCode::Enter => Action::PlaySelected,
            KeyCode::Char(' ') | KeyCode::Char('p') => Action::Toggle,
            KeyCode::Char('s') => Action::Stop,
            KeyCode::Char('H') | KeyCode::Left => Action::ScrubBack,
            KeyCode::Char('L') | KeyCode::Right => Action::ScrubForward,
            KeyCode::Char('+') | KeyCode::Char('=') => Action::VolumeUp,
            KeyCode::Char('-') => Action::VolumeDown,
            KeyCode::Char('d') | KeyCode::Delete => Action::DeleteSelected,
            KeyCode::Char('q') => Action::Quit,
            _ => return None,
        };
        Some(action)
    }
}

/// Main terminal event loop: handles input, UI drawing, playback events and
/// MPRIS commands. Returns `Ok(())` when shutdown is requested.
#[allow(clippy::too_many_arguments)]
pub fn run<B, S, E>(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    settings: &config::Settings,
    app: &mut App,
    catalog: &mut Catalog<S, E>,
    manager: &SessionManager<B>,
    events: &Receiver<PlaybackEvent>,
    control_rx: &Receiver<ControlCmd>,
    state: &mut EventLoopState,
) -> Result<(), Box<dyn std::error::Error>>
where
    B: AudioBackend,
    S: KeyValueStore,
    E: MetadataExtractor,
{
    loop {
        drain_events(events, app, manager);

        terminal.draw(|f| ui::draw(f, app, catalog.tracks(), &settings.ui, &settings.controls))?;

        while let Ok(cmd) = control_rx.try_recv() {
            if handle_control_cmd(cmd, app, manager) {
                return Ok(());
            }
        }

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let Some(action) = state.action_for(key) else {
                    continue;
                };
                if apply_action(action, settings, app, catalog, manager) {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Apply queued playback events to the view.
///
/// Events describe sessions that may already be gone (a stop queued before
/// the next play), so after any state change the view is rebuilt from the
/// manager's current snapshot.
fn drain_events<B: AudioBackend>(
    events: &Receiver<PlaybackEvent>,
    app: &mut App,
    manager: &SessionManager<B>,
) {
    let mut state_changed = false;
    for event in events.try_iter() {
        state_changed |= matches!(event, PlaybackEvent::StateChanged(_));
        app.apply_event(&event);
    }
    if state_changed {
        app.set_playback(manager.snapshot());
    }
}

/// Returns true when the loop should exit.
fn handle_control_cmd<B: AudioBackend>(
    cmd: ControlCmd,
    app: &mut App,
    manager: &SessionManager<B>,
) -> bool {
    match cmd {
        ControlCmd::Quit => {
            info!("quit requested over MPRIS");
            true
        }
        ControlCmd::Remote { cmd, reply } => {
            let status = manager.handle_remote(cmd);
            let _ = reply.send(status);
            app.set_playback(manager.snapshot());
            false
        }
    }
}

/// Returns true when the loop should exit.
fn apply_action<B, S, E>(
    action: Action,
    settings: &config::Settings,
    app: &mut App,
    catalog: &mut Catalog<S, E>,
    manager: &SessionManager<B>,
) -> bool
where
    B: AudioBackend,
    S: KeyValueStore,
    E: MetadataExtractor,
{
    let scrub = settings.controls.scrub_seconds as i64;
    let step = settings.controls.volume_step;

    match action {
        Action::Quit => return true,
        Action::Next => app.next(),
        Action::Prev => app.prev(),
        Action::First => app.first(),
        Action::Last => app.last(),
        Action::PlaySelected => play_selected(app, catalog, manager),
        Action::Toggle => {
            // Like MPRIS PlayPause, but starts the selection when idle.
            if !manager.toggle() {
                play_selected(app, catalog, manager);
            }
        }
        Action::Stop => {
            manager.stop();
        }
        Action::ScrubBack | Action::ScrubForward => {
            let delta = if action == Action::ScrubForward { scrub } else { -scrub };
            if let Err(e) = manager.seek_by(delta) {
                app.set_status(format!("Seek failed: {e}"));
            }
        }
        Action::VolumeUp | Action::VolumeDown => {
            let delta = if action == Action::VolumeUp { step } else { -step };
            let volume = manager.set_volume(manager.snapshot().volume + delta);
            app.set_status(format!("Volume {:.0}%", volume * 100.0));
        }
        Action::DeleteSelected => delete_selected(app, catalog, manager),
    }

    app.set_playback(manager.snapshot());
    false
}

fn play_selected<B, S, E>(app: &mut App, catalog: &Catalog<S, E>, manager: &SessionManager<B>)
where
    B: AudioBackend,
    S: KeyValueStore,
    E: MetadataExtractor,
{
    let Some(track) = catalog.get(app.selected) else {
        return;
    };

    let current = manager.snapshot();
    if current.source.as_deref() == Some(track.path.as_path()) {
        if current.state == PlaybackState::Paused {
            manager.resume();
        }
        return;
    }

    match manager.play_track(track) {
        Ok(()) => app.clear_status(),
        Err(e) => app.set_status(format!("Cannot play {}: {e}", track.display())),
    }
}

fn delete_selected<B, S, E>(app: &mut App, catalog: &mut Catalog<S, E>, manager: &SessionManager<B>)
where
    B: AudioBackend,
    S: KeyValueStore,
    E: MetadataExtractor,
{
    let Some(track) = catalog.get(app.selected) else {
        return;
    };
    let name = track.display();
    if manager.snapshot().source.as_deref() == Some(track.path.as_path()) {
        manager.stop();
    }

    match catalog.delete(&[app.selected]) {
        Ok(_) => app.set_status(format!("Deleted {name}")),
        Err(e) => {
            warn!(error = %e, "delete could not be saved");
            app.set_status(format!("Delete failed: {e}"));
        }
    }
    app.set_len(catalog.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::fakes::{FakeBackend, RecordingSurface};
    use crossterm::event::KeyModifiers;
    use std::path::Path;
    use std::sync::Arc;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn double_g_jumps_to_first() {
        let mut state = EventLoopState::default();

        assert_eq!(state.action_for(press(KeyCode::Char('g'))), None);
        assert!(state.pending_gg);
        assert_eq!(
            state.action_for(press(KeyCode::Char('g'))),
            Some(Action::First)
        );
        assert!(!state.pending_gg);
    }

    #[test]
    fn any_other_key_disarms_the_g_prefix() {
        let mut state = EventLoopState::default();

        state.action_for(press(KeyCode::Char('g')));
        assert_eq!(state.action_for(press(KeyCode::Char('j'))), Some(Action::Next));
        assert_eq!(state.action_for(press(KeyCode::Char('g'))), None);
    }

    #[test]
    fn transport_keys_map_to_actions() {
        let mut state = EventLoopState::default();
        let cases = [
            (KeyCode::Enter, Action::PlaySelected),
            (KeyCode::Char(' '), Action::Toggle),
            (KeyCode::Char('p'), Action::Toggle),
            (KeyCode::Char('s'), Action::Stop),
            (KeyCode::Char('H'), Action::ScrubBack),
            (KeyCode::Char('L'), Action::ScrubForward),
            (KeyCode::Char('+'), Action::VolumeUp),
            (KeyCode::Char('-'), Action::VolumeDown),
            (KeyCode::Char('d'), Action::DeleteSelected),
            (KeyCode::Char('G'), Action::Last),
            (KeyCode::Char('q'), Action::Quit),
        ];
        for (code, expected) in cases {
            assert_eq!(state.action_for(press(code)), Some(expected), "{code:?}");
        }
        assert_eq!(state.action_for(press(KeyCode::Char('x'))), None);
    }

    #[test]
    fn stale_stop_does_not_blank_the_next_track() {
        let manager = SessionManager::new(
            FakeBackend::default(),
            Arc::new(RecordingSurface::default()),
            Duration::from_secs(3600),
        );
        let events = manager.subscribe();
        let mut app = App::new(2);

        manager.play(Path::new("/m/a.mp3"), "A", "Band", None).unwrap();
        manager.stop();
        manager.play(Path::new("/m/b.mp3"), "B", "Band", None).unwrap();
        // The view already caught up with B before the queue is drained.
        app.set_playback(manager.snapshot());

        drain_events(&events, &mut app, &manager);

        assert_eq!(app.playback.state, PlaybackState::Playing);
        assert_eq!(app.playback.title.as_deref(), Some("B"));
        assert_eq!(app.playback.source.as_deref(), Some(Path::new("/m/b.mp3")));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn progress_only_drain_keeps_the_event_values() {
        let manager = SessionManager::new(
            FakeBackend::default(),
            Arc::new(RecordingSurface::default()),
            Duration::from_secs(3600),
        );
        let (tx, events) = std::sync::mpsc::channel();
        let mut app = App::new(1);
        tx.send(PlaybackEvent::Progress {
            elapsed: Duration::from_secs(9),
            duration: Some(Duration::from_secs(60)),
        })
        .unwrap();

        drain_events(&events, &mut app, &manager);

        assert_eq!(app.playback.elapsed, Duration::from_secs(9));
        assert_eq!(app.playback.duration, Some(Duration::from_secs(60)));
    }
}
