//! Application model: cursor over the catalog and the last known playback
//! snapshot, as rendered by the UI.

use std::time::Duration;

use crate::audio::{PlaybackEvent, PlaybackSnapshot, PlaybackState};
use crate::library::Track;

/// The main application model.
///
/// The catalog itself is owned by the runtime; `App` only tracks how many
/// rows there are and which one is selected.
#[derive(Debug, Default)]
pub struct App {
    pub selected: usize,
    len: usize,
    pub playback: PlaybackSnapshot,
    pub status_message: Option<String>,
}

impl App {
    /// Create a new `App` over a list of `len` tracks.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Return true if the library contains any tracks.
    pub fn has_tracks(&self) -> bool {
        self.len > 0
    }

    /// Update the row count after imports or deletes, keeping the cursor in range.
    pub fn set_len(&mut self, len: usize) {
        self.len = len;
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    /// Move selection to the next track, wrapping to the first.
    pub fn next(&mut self) {
        if self.len > 0 {
            self.selected = (self.selected + 1) % self.len;
        }
    }

    /// Move selection to the previous track, wrapping to the last.
    pub fn prev(&mut self) {
        if self.len > 0 {
            self.selected = self.selected.checked_sub(1).unwrap_or(self.len - 1);
        }
    }

    pub fn first(&mut self) {
        self.selected = 0;
    }

    pub fn last(&mut self) {
        self.selected = self.len.saturating_sub(1);
    }

    /// Position of the playing track in `tracks`, by path.
    pub fn playing_index(&self, tracks: &[Track]) -> Option<usize> {
        let source = self.playback.source.as_ref()?;
        tracks.iter().position(|t| &t.path == source)
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
    }

    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    /// Replace the playback view wholesale, e.g. right after a transport call.
    pub fn set_playback(&mut self, snapshot: PlaybackSnapshot) {
        self.playback = snapshot;
    }

    /// Fold a subscriber event into the playback view.
    pub fn apply_event(&mut self, event: &PlaybackEvent) {
        match *event {
            PlaybackEvent::StateChanged(PlaybackState::Stopped) => {
                self.playback = PlaybackSnapshot {
                    volume: self.playback.volume,
                    ..PlaybackSnapshot::default()
                };
            }
            PlaybackEvent::StateChanged(state) => self.playback.state = state,
            PlaybackEvent::Progress { elapsed, duration } => {
                self.playback.elapsed = elapsed;
                self.playback.duration = duration;
            }
        }
    }

    /// Elapsed and total time of the current session, if any.
    pub fn progress(&self) -> Option<(Duration, Option<Duration>)> {
        match self.playback.state {
            PlaybackState::Stopped => None,
            _ => Some((self.playback.elapsed, self.playback.duration)),
        }
    }
}
