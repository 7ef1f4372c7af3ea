//! Audio-related small types.
//!
//! Playback state, the events published to subscribers, the now-playing
//! snapshot pushed to the OS surface and the remote command vocabulary.

use std::path::PathBuf;
use std::time::Duration;

use crate::library::Artwork;

/// The playback state of the session manager.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PlaybackState {
    /// No active session.
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    /// Playback rate as reported to the now-playing surface.
    pub fn rate(self) -> f64 {
        match self {
            Self::Playing => 1.0,
            Self::Stopped | Self::Paused => 0.0,
        }
    }
}

/// Change notifications delivered through [`SessionManager::subscribe`](super::SessionManager::subscribe).
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    StateChanged(PlaybackState),
    /// Periodic time sync while a session is active.
    Progress {
        elapsed: Duration,
        duration: Option<Duration>,
    },
}

/// Point-in-time view of the manager, for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub source: Option<PathBuf>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub elapsed: Duration,
    pub duration: Option<Duration>,
    pub volume: f32,
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self {
            state: PlaybackState::Stopped,
            source: None,
            title: None,
            artist: None,
            elapsed: Duration::ZERO,
            duration: None,
            volume: 1.0,
        }
    }
}

/// Full "now playing" entry for the OS media surface.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingInfo {
    pub title: String,
    pub artist: String,
    pub duration: Option<Duration>,
    pub elapsed: Duration,
    pub rate: f64,
    pub artwork: Option<Artwork>,
}

/// Commands arriving from the OS remote-control surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteCommand {
    Play,
    Pause,
    PlayPause,
    Stop,
    /// Absolute position within the current track.
    SetPosition(Duration),
}

/// Reply to a [`RemoteCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    NoActiveSession,
    /// A session exists but the backend refused the command.
    Failed,
}
