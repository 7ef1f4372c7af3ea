//! The playback session manager.
//!
//! Owns at most one live audio session, keeps the now-playing surface in step
//! with it and publishes state changes to subscribers. All transitions happen
//! under a single lock, so calls from the UI loop and from the remote-control
//! thread are serialized.

use std::io;
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::PlaybackError;
use crate::library::{Artwork, Track};

use super::backend::{AudioBackend, AudioSession};
use super::surface::NowPlayingSurface;
use super::ticker::{CancelToken, RepeatingTask};
use super::types::{
    CommandStatus, NowPlayingInfo, PlaybackEvent, PlaybackSnapshot, PlaybackState, RemoteCommand,
};

pub struct SessionManager<B: AudioBackend> {
    backend: B,
    shared: Arc<Shared<B::Session>>,
    sync_interval: Duration,
    #[cfg(test)]
    pub(crate) fail_sync_spawn: AtomicBool,
}

struct Shared<S> {
    state: Mutex<ManagerState<S>>,
    surface: Arc<dyn NowPlayingSurface>,
}

struct ManagerState<S> {
    session: Option<Session<S>>,
    status: PlaybackState,
    volume: f32,
    subscribers: Vec<Sender<PlaybackEvent>>,
}

struct Session<S> {
    audio: S,
    source: PathBuf,
    title: String,
    artist: String,
    artwork: Option<Artwork>,
    duration: Option<Duration>,
    // Dropped (and thereby cancelled) together with the session.
    sync: RepeatingTask,
}

impl<S: AudioSession> Session<S> {
    fn now_playing(&self, status: PlaybackState) -> NowPlayingInfo {
        NowPlayingInfo {
            title: self.title.clone(),
            artist: self.artist.clone(),
            duration: self.duration,
            elapsed: self.audio.position(),
            rate: status.rate(),
            artwork: self.artwork.clone(),
        }
    }
}

impl<S: AudioSession> ManagerState<S> {
    fn notify(&mut self, event: PlaybackEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn set_status(&mut self, status: PlaybackState) {
        if self.status != status {
            self.status = status;
            self.notify(PlaybackEvent::StateChanged(status));
        }
    }

    /// Tear down the current session, if any: cancel its sync task, silence
    /// and drop the audio, clear the surface. Returns whether one existed.
    fn end_session(&mut self, surface: &dyn NowPlayingSurface) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        session.sync.cancel();
        session.audio.stop();
        drop(session);

        surface.clear();
        self.set_status(PlaybackState::Stopped);
        true
    }

    /// Push elapsed time to the surface, or finish the session when the
    /// audio has run out. Returns false once there is nothing left to sync.
    fn sync(&mut self, surface: &dyn NowPlayingSurface) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };

        if session.audio.is_finished() {
            info!(source = %session.source.display(), "playback finished");
            self.end_session(surface);
            return false;
        }

        let elapsed = session.audio.position();
        let duration = session.duration;
        surface.update_progress(elapsed, self.status.rate());
        self.notify(PlaybackEvent::Progress { elapsed, duration });
        true
    }

    fn pause(&mut self, surface: &dyn NowPlayingSurface) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        session.audio.pause();
        let elapsed = session.audio.position();
        self.set_status(PlaybackState::Paused);
        surface.update_progress(elapsed, PlaybackState::Paused.rate());
        true
    }

    fn resume(&mut self, surface: &dyn NowPlayingSurface) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        session.audio.play();
        let elapsed = session.audio.position();
        self.set_status(PlaybackState::Playing);
        surface.update_progress(elapsed, PlaybackState::Playing.rate());
        true
    }

    /// `None` without a session. The surface only hears about seeks the
    /// audio accepted.
    fn seek(
        &self,
        to: Duration,
        surface: &dyn NowPlayingSurface,
    ) -> Option<Result<(), PlaybackError>> {
        let session = self.session.as_ref()?;
        let target = match session.duration {
            Some(total) => to.min(total),
            None => to,
        };
        if let Err(e) = session.audio.seek(target) {
            debug!(source = %session.source.display(), error = %e, "seek rejected");
            return Some(Err(e));
        }
        surface.seeked(session.audio.position(), self.status.rate());
        Some(Ok(()))
    }
}

impl<S: AudioSession> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, ManagerState<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(&self, token: &CancelToken) -> bool {
        let mut state = self.lock();
        // Checked under the lock: once a session ends, its ticks never land.
        if token.is_cancelled() {
            return false;
        }
        state.sync(self.surface.as_ref())
    }
}

impl<B: AudioBackend> SessionManager<B> {
    pub fn new(backend: B, surface: Arc<dyn NowPlayingSurface>, sync_interval: Duration) -> Self {
        Self {
            backend,
            shared: Arc::new(Shared {
                state: Mutex::new(ManagerState {
                    session: None,
                    status: PlaybackState::Stopped,
                    volume: 1.0,
                    subscribers: Vec::new(),
                }),
                surface,
            }),
            sync_interval,
            #[cfg(test)]
            fail_sync_spawn: AtomicBool::new(false),
        }
    }

    /// Receive every subsequent [`PlaybackEvent`]. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        let (tx, rx) = mpsc::channel();
        self.shared.lock().subscribers.push(tx);
        rx
    }

    pub fn status(&self) -> PlaybackState {
        self.shared.lock().status
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let state = self.shared.lock();
        match state.session.as_ref() {
            Some(s) => PlaybackSnapshot {
                state: state.status,
                source: Some(s.source.clone()),
                title: Some(s.title.clone()),
                artist: Some(s.artist.clone()),
                elapsed: s.audio.position(),
                duration: s.duration,
                volume: state.volume,
            },
            None => PlaybackSnapshot {
                state: state.status,
                volume: state.volume,
                ..PlaybackSnapshot::default()
            },
        }
    }

    /// Start playing `source`, replacing any current session.
    ///
    /// The new resource is opened and its sync task started before the old
    /// session is touched: if either fails the error is returned and the
    /// current session (if any) keeps playing.
    pub fn play(
        &self,
        source: &Path,
        title: impl Into<String>,
        artist: impl Into<String>,
        artwork: Option<Artwork>,
    ) -> Result<(), PlaybackError> {
        let audio = self.backend.open(source).map_err(|e| {
            warn!(source = %source.display(), error = %e, "cannot play");
            e
        })?;

        let mut state = self.shared.lock();
        // Its first tick waits for the lock, so it only ever sees the new session.
        let sync = self.spawn_sync().map_err(|e| {
            warn!(source = %source.display(), error = %e, "cannot start now-playing sync");
            PlaybackError::Sync(e)
        })?;
        if let Some(old) = state.session.take() {
            debug!(source = %old.source.display(), "superseded");
            old.sync.cancel();
            old.audio.stop();
        }

        audio.set_volume(state.volume);
        audio.play();

        let session = Session {
            duration: audio.duration(),
            audio,
            source: source.to_path_buf(),
            title: title.into(),
            artist: artist.into(),
            artwork,
            sync,
        };

        // `set_status` would skip the event when replacing a playing session.
        state.status = PlaybackState::Playing;
        state.notify(PlaybackEvent::StateChanged(PlaybackState::Playing));
        self.shared
            .surface
            .publish(&session.now_playing(PlaybackState::Playing));

        info!(source = %session.source.display(), "playing");
        state.session = Some(session);
        Ok(())
    }

    /// [`play`](Self::play) with the track's own metadata.
    pub fn play_track(&self, track: &Track) -> Result<(), PlaybackError> {
        self.play(
            &track.path,
            track.title.clone(),
            track.artist.clone(),
            track.artwork.clone(),
        )
    }

    /// Pause output. No-op without a session.
    pub fn pause(&self) -> bool {
        self.shared.lock().pause(self.shared.surface.as_ref())
    }

    /// Resume output. No-op without a session.
    pub fn resume(&self) -> bool {
        self.shared.lock().resume(self.shared.surface.as_ref())
    }

    /// Pause when playing, resume when paused. No-op without a session.
    pub fn toggle(&self) -> bool {
        let mut state = self.shared.lock();
        let surface = self.shared.surface.as_ref();
        match state.status {
            PlaybackState::Playing => state.pause(surface),
            PlaybackState::Paused => state.resume(surface),
            PlaybackState::Stopped => false,
        }
    }

    /// End the session and clear the surface. Idempotent.
    pub fn stop(&self) -> bool {
        let ended = self.shared.lock().end_session(self.shared.surface.as_ref());
        if ended {
            info!("stopped");
        }
        ended
    }

    /// Move to `to`, clamped to the track length. Play/pause state is kept.
    ///
    /// `Ok(false)` without a session; an error when the audio refused to seek.
    pub fn seek(&self, to: Duration) -> Result<bool, PlaybackError> {
        let state = self.shared.lock();
        state
            .seek(to, self.shared.surface.as_ref())
            .transpose()
            .map(|applied| applied.is_some())
    }

    /// Move by `delta_secs` from the current position, clamped at zero.
    pub fn seek_by(&self, delta_secs: i64) -> Result<bool, PlaybackError> {
        let state = self.shared.lock();
        let Some(session) = state.session.as_ref() else {
            return Ok(false);
        };
        let elapsed = session.audio.position();
        let delta = Duration::from_secs(delta_secs.unsigned_abs());
        let target = if delta_secs >= 0 {
            elapsed.saturating_add(delta)
        } else {
            elapsed.saturating_sub(delta)
        };
        state
            .seek(target, self.shared.surface.as_ref())
            .transpose()
            .map(|applied| applied.is_some())
    }

    /// Set output volume in `[0, 1]`; kept for later sessions too.
    pub fn set_volume(&self, volume: f32) -> f32 {
        let volume = volume.clamp(0.0, 1.0);
        let mut state = self.shared.lock();
        state.volume = volume;
        if let Some(session) = state.session.as_ref() {
            session.audio.set_volume(volume);
        }
        volume
    }

    /// Run one time sync right away, including end-of-track detection.
    pub fn sync_now(&self) {
        let mut state = self.shared.lock();
        state.sync(self.shared.surface.as_ref());
    }

    /// Apply a command from the OS remote-control surface.
    pub fn handle_remote(&self, cmd: RemoteCommand) -> CommandStatus {
        debug!(?cmd, "remote command");
        let handled = match cmd {
            RemoteCommand::Play => Ok(self.resume()),
            RemoteCommand::Pause => Ok(self.pause()),
            RemoteCommand::PlayPause => Ok(self.toggle()),
            RemoteCommand::Stop => Ok(self.stop()),
            RemoteCommand::SetPosition(to) => self.seek(to),
        };
        match handled {
            Ok(true) => CommandStatus::Success,
            Ok(false) => CommandStatus::NoActiveSession,
            Err(_) => CommandStatus::Failed,
        }
    }

    fn spawn_sync(&self) -> io::Result<RepeatingTask> {
        #[cfg(test)]
        {
            if self.fail_sync_spawn.load(Ordering::SeqCst) {
                return Err(io::Error::other("thread spawn refused"));
            }
        }
        let weak: Weak<Shared<B::Session>> = Arc::downgrade(&self.shared);
        RepeatingTask::spawn("tapedeck-sync", self.sync_interval, move |token| {
            match weak.upgrade() {
                Some(shared) => shared.tick(token),
                None => false,
            }
        })
    }
}

impl<B: AudioBackend> Drop for SessionManager<B> {
    fn drop(&mut self) {
        self.stop();
    }
}
